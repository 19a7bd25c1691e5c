use std::hint::black_box;

use criterion::*;

use ecs_runtime::{AccessTable, Component, FnSystem, Scheduler, Store};

struct Wealth {
    value: f32,
}
impl Component for Wealth {}

struct Productivity {
    rate: f32,
}
impl Component for Productivity {}

fn populate(count: usize) -> Store {
    let mut store = Store::new();
    store.register_component::<Wealth>("Wealth").unwrap();
    store.register_component::<Productivity>("Productivity").unwrap();
    for _ in 0..count {
        let entity = store.create_entity();
        store.add_component(entity.id(), "Wealth", Box::new(Wealth { value: 100.0 }));
        store.add_component(
            entity.id(),
            "Productivity",
            Box::new(Productivity { rate: 1.0 }),
        );
    }
    store
}

fn tick_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");

    group.bench_function("tick_2_systems_10k", |b| {
        b.iter_batched(
            || {
                let store = populate(10_000);

                let mut scheduler = Scheduler::new();

                // System 1: wealth += productivity
                scheduler.add_system(FnSystem::new(
                    "production",
                    AccessTable::new().read("Productivity").write("Wealth"),
                    |view, _commands, _delta| {
                        let rate = view.read::<Productivity>("Productivity").rate;
                        view.write::<Wealth>("Wealth").value += rate;
                    },
                ));

                // System 2: wealth decay
                scheduler.add_system(
                    FnSystem::new(
                        "decay",
                        AccessTable::new().write("Wealth"),
                        |view, _commands, _delta| {
                            view.write::<Wealth>("Wealth").value *= 0.995;
                        },
                    )
                    .after(&["production"]),
                );

                scheduler.build();
                (store, scheduler)
            },
            |(mut store, mut scheduler)| {
                scheduler.run(&mut store, 0.016);
                black_box(store.entity_count())
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("tick_parallel_body_10k", |b| {
        b.iter_batched(
            || {
                let store = populate(10_000);

                let mut scheduler = Scheduler::new();
                scheduler.add_system(
                    FnSystem::new(
                        "production",
                        AccessTable::new().read("Productivity").write("Wealth"),
                        |view, _commands, _delta| {
                            let rate = view.read::<Productivity>("Productivity").rate;
                            view.write::<Wealth>("Wealth").value += rate;
                        },
                    )
                    .parallel(true),
                );
                scheduler.build();
                (store, scheduler)
            },
            |(mut store, mut scheduler)| {
                scheduler.run(&mut store, 0.016);
                black_box(store.entity_count())
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, tick_benchmark);
criterion_main!(benches);
