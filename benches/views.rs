use std::hint::black_box;

use criterion::*;

use ecs_runtime::{Component, Store};

#[allow(dead_code)]
struct Position {
    x: f32,
}
impl Component for Position {}

#[allow(dead_code)]
struct Velocity {
    dx: f32,
}
impl Component for Velocity {}

struct Flag;
impl Component for Flag {}

fn populate(count: usize) -> Store {
    let mut store = Store::new();
    store.register_component::<Position>("Position").unwrap();
    store.register_component::<Velocity>("Velocity").unwrap();
    store.register_component::<Flag>("Flag").unwrap();
    for index in 0..count {
        let entity = store.create_entity();
        store.add_component(
            entity.id(),
            "Position",
            Box::new(Position { x: index as f32 }),
        );
        if index % 2 == 0 {
            store.add_component(entity.id(), "Velocity", Box::new(Velocity { dx: 1.0 }));
        }
        if index % 8 == 0 {
            store.add_component(entity.id(), "Flag", Box::new(Flag));
        }
    }
    store
}

fn view_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("views");

    group.bench_function("cache_initial_build_100k", |b| {
        b.iter_batched(
            || populate(100_000),
            |mut store| black_box(store.multi_view(&["Position", "Velocity"]).len()),
            BatchSize::LargeInput,
        );
    });

    group.bench_function("cache_churn_10k", |b| {
        b.iter_batched(
            || {
                let mut store = populate(10_000);
                store.multi_view(&["Position", "Velocity"]);
                let movers: Vec<u32> = store
                    .view("Velocity")
                    .map(|slot| slot.owner())
                    .collect();
                (store, movers)
            },
            |(mut store, movers)| {
                for &entity in &movers {
                    store.remove_component(entity, "Velocity");
                    store.add_component(entity, "Velocity", Box::new(Velocity { dx: 2.0 }));
                }
                black_box(store.cached_view(&["Position", "Velocity"]).unwrap().len())
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("query_with_without_10k", |b| {
        b.iter_batched(
            || populate(10_000),
            |mut store| {
                let rows = store
                    .query()
                    .with(&["Position", "Velocity"])
                    .without(&["Flag"])
                    .exec();
                black_box(rows.len())
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, view_benchmark);
criterion_main!(benches);
