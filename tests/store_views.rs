use std::sync::{Arc, Mutex};

use ecs_runtime::{
    AccessTable, CommandBuffer, Component, Entity, FnSystem, QueryRow, Scheduler, Store,
};

struct Health {
    value: i32,
}
impl Component for Health {}

#[allow(dead_code)]
struct Mana {
    value: i32,
}
impl Component for Mana {}

#[allow(dead_code)]
#[derive(Clone, Copy)]
struct Pos {
    x: f32,
    y: f32,
}
impl Component for Pos {}

fn store() -> Store {
    let mut store = Store::new();
    store.register_component::<Health>("Health").unwrap();
    store.register_component::<Mana>("Mana").unwrap();
    store.register_component::<Pos>("Pos").unwrap();
    store
}

/// The three indices must agree for every (entity, name) pair.
fn assert_indices_agree(store: &Store, entity: Entity, name: &'static str, present: bool) {
    let id = entity.id();
    assert_eq!(store.has_component(id, name), present);
    assert_eq!(
        store.get_components(id).any(|slot| slot.name() == name),
        present
    );
    assert_eq!(store.view(name).any(|slot| slot.owner() == id), present);
}

#[test]
fn entity_component_crud() {
    let mut store = store();

    let mut entity = store.create_entity();
    assert!(store.is_live(entity));

    assert!(store.add_component(entity.id(), "Health", Box::new(Health { value: 100 })));
    assert!(store.has_component(entity.id(), "Health"));
    assert!(!store.has_component(entity.id(), "Mana"));
    assert_indices_agree(&store, entity, "Health", true);

    let slot = store.get_component(entity.id(), "Health").unwrap();
    assert_eq!(slot.read::<Health>().value, 100);
    assert_eq!(slot.owner(), entity.id());
    assert_eq!(slot.name(), "Health");

    slot.write::<Health>().value = 50;
    assert_eq!(
        store
            .get_component(entity.id(), "Health")
            .unwrap()
            .read::<Health>()
            .value,
        50
    );

    assert!(store.add_component(entity.id(), "Pos", Box::new(Pos { x: 1.0, y: 2.0 })));
    assert!(store.remove_component(entity.id(), "Health"));
    assert!(!store.has_component(entity.id(), "Health"));
    assert!(store.has_component(entity.id(), "Pos"));
    assert_indices_agree(&store, entity, "Health", false);

    // A second attach under an occupied name fails.
    assert!(!store.add_component(entity.id(), "Pos", Box::new(Pos { x: 9.0, y: 9.0 })));

    assert!(store.destroy_entity(&mut entity));
    assert!(entity.is_null());
    assert!(!store.is_live(entity));
}

#[test]
fn create_entity_at_replaces_and_advances_watermark() {
    let mut store = store();

    let replaced = store.create_entity_at(7);
    assert_eq!(replaced.id(), 7);
    store.add_component(7, "Health", Box::new(Health { value: 1 }));

    // Recreating at the same id destroys the previous occupant first.
    let fresh = store.create_entity_at(7);
    assert_eq!(fresh.id(), 7);
    assert!(!store.has_component(7, "Health"));

    // The watermark covers explicit ids, so allocation never collides.
    let next = store.create_entity();
    assert_eq!(next.id(), 8);
    assert_eq!(store.last_entity_id(), 8);
}

#[test]
fn single_and_multi_views() {
    let mut store = store();

    let e1 = store.create_entity();
    store.add_component(e1.id(), "Health", Box::new(Health { value: 100 }));
    store.add_component(e1.id(), "Pos", Box::new(Pos { x: 0.0, y: 0.0 }));

    let e2 = store.create_entity();
    store.add_component(e2.id(), "Health", Box::new(Health { value: 20 }));
    store.add_component(e2.id(), "Mana", Box::new(Mana { value: 30 }));

    let e3 = store.create_entity();
    store.add_component(e3.id(), "Pos", Box::new(Pos { x: 1.0, y: 1.0 }));
    store.add_component(e3.id(), "Mana", Box::new(Mana { value: 5 }));

    let e4 = store.create_entity();
    store.add_component(e4.id(), "Health", Box::new(Health { value: 10 }));

    assert_eq!(store.view("Health").count(), 3);

    let view = store.multi_view(&["Health", "Pos"]);
    assert_eq!(view.len(), 1);
    assert_eq!(view.records()[0].entity(), e1);

    // Signature order does not matter: [Pos, Health] is the same cache.
    assert!(store.cached_view(&["Pos", "Health"]).is_some());

    let rows = store.query().with(&["Health"]).without(&["Pos"]).exec();
    assert_eq!(rows.len(), 2);

    let rows = store.query().any_of(&["Pos", "Mana"]).exec();
    assert_eq!(rows.len(), 3);
    let sparse = rows
        .iter()
        .find(|row| row.entity() == e1)
        .expect("e1 matches via Pos");
    assert!(sparse.has("Pos"));
    assert!(!sparse.has("Mana"));

    let rows = store
        .query()
        .with(&["Health"])
        .filter(|row: &QueryRow| row.read::<Health>("Health").value > 15)
        .exec();
    assert_eq!(rows.len(), 2);

    // No anchor clause: empty by policy.
    assert!(store.query().without(&["Health"]).exec().is_empty());
}

#[test]
fn reactive_cache_follows_mutations() {
    let mut store = store();

    let e = store.create_entity();
    store.add_component(e.id(), "Health", Box::new(Health { value: 1 }));

    assert!(store.multi_view(&["Health", "Pos"]).is_empty());

    store.add_component(e.id(), "Pos", Box::new(Pos { x: 0.0, y: 0.0 }));
    {
        let view = store.cached_view(&["Health", "Pos"]).unwrap();
        assert_eq!(view.len(), 1);
        assert_eq!(view.records()[0].entity(), e);
    }

    store.remove_component(e.id(), "Pos");
    assert!(store.cached_view(&["Health", "Pos"]).unwrap().is_empty());

    store.add_component(e.id(), "Pos", Box::new(Pos { x: 3.0, y: 4.0 }));
    assert_eq!(store.cached_view(&["Health", "Pos"]).unwrap().len(), 1);

    store.remove_entity(e.id());
    assert!(store.cached_view(&["Health", "Pos"]).unwrap().is_empty());
}

#[test]
fn cache_round_trip_is_pointwise_stable() {
    let mut store = store();

    let mut matched = Vec::new();
    for index in 0..8 {
        let e = store.create_entity();
        store.add_component(e.id(), "Health", Box::new(Health { value: index }));
        if index % 2 == 0 {
            store.add_component(e.id(), "Pos", Box::new(Pos { x: 0.0, y: 0.0 }));
            matched.push(e);
        }
    }

    let before: Vec<Entity> = {
        let mut entities: Vec<Entity> = store
            .multi_view(&["Health", "Pos"])
            .records()
            .iter()
            .map(|record| record.entity())
            .collect();
        entities.sort_by_key(|entity| entity.id());
        entities
    };

    // A churn sequence that restores every entity's component set.
    for entity in &matched {
        store.remove_component(entity.id(), "Pos");
        store.add_component(entity.id(), "Mana", Box::new(Mana { value: 0 }));
        store.remove_component(entity.id(), "Mana");
        store.add_component(entity.id(), "Pos", Box::new(Pos { x: 0.0, y: 0.0 }));
    }

    let mut after: Vec<Entity> = store
        .cached_view(&["Health", "Pos"])
        .unwrap()
        .records()
        .iter()
        .map(|record| record.entity())
        .collect();
    after.sort_by_key(|entity| entity.id());

    assert_eq!(before, after);
}

#[test]
fn command_stream_is_sequential_at_flush() {
    let mut store = store();
    let entity = store.create_entity();

    let observed: Arc<Mutex<Option<bool>>> = Arc::new(Mutex::new(None));
    let probe = Arc::clone(&observed);
    let id = entity.id();

    let mut buffer = CommandBuffer::new();
    buffer.entity(entity).destroy();
    buffer.defer(move |store| {
        *probe.lock().unwrap() = Some(store.has_entity(id));
    });

    assert!(store.has_entity(id));
    assert!(observed.lock().unwrap().is_none());

    buffer.flush(&mut store);

    assert!(!store.has_entity(id));
    assert_eq!(*observed.lock().unwrap(), Some(false));
    assert!(buffer.is_empty());
}

#[test]
fn spawn_builder_and_deduced_names() {
    let mut store = store();

    let mut buffer = CommandBuffer::new();
    buffer
        .spawn()
        .with(Health { value: 40 })
        .with_named("Pos", Pos { x: 1.0, y: 1.0 });
    buffer.spawn().with(Mana { value: 9 });

    buffer.flush(&mut store);

    assert_eq!(store.entity_count(), 2);
    assert_eq!(store.view("Health").count(), 1);
    assert_eq!(store.view("Pos").count(), 1);
    assert_eq!(store.view("Mana").count(), 1);

    let healthy = store.view("Health").next().unwrap().owner();
    assert!(store.has_component(healthy, "Pos"));
}

#[test]
fn missing_referents_are_skipped_not_fatal() {
    let mut store = store();
    let entity = store.create_entity();

    let mut buffer = CommandBuffer::new();
    // ADD_TO_NEW with no SPAWN in the stream.
    buffer.push(ecs_runtime::Command::AddToNew {
        name: None,
        component: Box::new(Health { value: 1 }),
    });
    // ADD_COMP after the same stream destroys the target.
    buffer.entity(entity).add(Mana { value: 1 });
    buffer.entity(entity).destroy();
    buffer.entity(entity).add(Health { value: 1 });

    buffer.flush(&mut store);

    assert!(!store.has_entity(entity.id()));
    assert_eq!(store.entity_count(), 0);
}

#[test]
fn merge_appends_streams_and_event_batches() {
    let mut store = store();

    let log: Arc<Mutex<Vec<i32>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    store.events_mut().add_listener("score", move |payload| {
        sink.lock()
            .unwrap()
            .push(*payload.downcast_ref::<i32>().unwrap());
    });

    let mut first = CommandBuffer::new();
    first.spawn().with(Health { value: 1 });
    first.send_event("score", 1i32);
    first.send_event("score", 2i32);

    let mut second = CommandBuffer::new();
    second.spawn().with(Mana { value: 1 });
    second.send_event("score", 3i32);

    first.merge(&mut second);
    assert!(second.is_empty());

    first.flush(&mut store);

    assert_eq!(store.entity_count(), 2);
    assert_eq!(*log.lock().unwrap(), vec![1, 2, 3]);
}

#[test]
fn observers_see_adds_and_removes() {
    struct Counter {
        added: Arc<Mutex<u32>>,
        removed: Arc<Mutex<u32>>,
    }
    impl ecs_runtime::StoreObserver for Counter {
        fn component_added(&mut self, _entity: Entity, _slot: &ecs_runtime::SharedComponent) {
            *self.added.lock().unwrap() += 1;
        }
        fn component_removed(&mut self, _entity: Entity, _slot: &ecs_runtime::SharedComponent) {
            *self.removed.lock().unwrap() += 1;
        }
    }

    let mut store = store();
    let added = Arc::new(Mutex::new(0));
    let removed = Arc::new(Mutex::new(0));
    let id = store.add_observer(Box::new(Counter {
        added: Arc::clone(&added),
        removed: Arc::clone(&removed),
    }));

    let entity = store.create_entity();
    store.add_component(entity.id(), "Health", Box::new(Health { value: 1 }));
    store.add_component(entity.id(), "Pos", Box::new(Pos { x: 0.0, y: 0.0 }));
    store.remove_entity(entity.id());

    assert_eq!(*added.lock().unwrap(), 2);
    // Destruction cascades: both components fire removal before the row goes.
    assert_eq!(*removed.lock().unwrap(), 2);

    assert!(store.remove_observer(id));
    assert!(!store.remove_observer(id));
}

#[test]
fn snapshot_hooks_delegate_through_slots() {
    use std::any::Any;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MapArchive {
        entries: HashMap<String, Box<dyn Any + Send>>,
    }
    impl ecs_runtime::Archive for MapArchive {
        fn put(&mut self, key: &str, value: Box<dyn Any + Send>) {
            self.entries.insert(key.to_string(), value);
        }
        fn take(&mut self, key: &str) -> Option<Box<dyn Any + Send>> {
            self.entries.remove(key)
        }
    }

    struct Score {
        points: i32,
    }
    impl Component for Score {
        fn pack(&self, archive: &mut dyn ecs_runtime::Archive) {
            archive.put("points", Box::new(self.points));
        }
        fn unpack(&mut self, archive: &mut dyn ecs_runtime::Archive) {
            if let Some(points) = archive.take("points") {
                self.points = *points.downcast::<i32>().unwrap();
            }
        }
        fn test(&self) -> bool {
            self.points >= 0
        }
    }

    let mut store = Store::new();
    store.register_component::<Score>("Score").unwrap();
    let entity = store.create_entity();
    store.add_component(entity.id(), "Score", Box::new(Score { points: 42 }));

    // Snapshot path: walk ids, walk components, delegate into the archive.
    let mut archive = MapArchive::default();
    for id in store.entity_ids().collect::<Vec<_>>() {
        for slot in store.get_components(id) {
            assert!(slot.test());
            slot.pack(&mut archive);
        }
    }
    assert_eq!(store.last_entity_id(), entity.id());

    // Restore into a second store at the same ids and watermark.
    let mut restored = Store::new();
    restored.register_component::<Score>("Score").unwrap();
    let copy = restored.create_entity_at(entity.id());
    restored.add_component(copy.id(), "Score", Box::new(Score { points: 0 }));
    restored
        .get_component(copy.id(), "Score")
        .unwrap()
        .unpack(&mut archive);
    restored.set_last_entity_id(store.last_entity_id());

    assert_eq!(
        restored
            .get_component(copy.id(), "Score")
            .unwrap()
            .read::<Score>()
            .points,
        42
    );
    assert_eq!(restored.last_entity_id(), store.last_entity_id());
}

#[test]
fn events_dispatch_to_scheduled_buffers() {
    let mut store = store();

    for _ in 0..4 {
        let e = store.create_entity();
        store.add_component(e.id(), "Health", Box::new(Health { value: 1 }));
    }

    let hits: Arc<Mutex<u32>> = Arc::new(Mutex::new(0));
    let sink = Arc::clone(&hits);
    store.events_mut().add_listener("tick", move |_payload| {
        *sink.lock().unwrap() += 1;
    });

    let mut scheduler = Scheduler::new();
    scheduler.add_system(FnSystem::new(
        "announcer",
        AccessTable::new().read("Health"),
        |view, commands, _delta| {
            commands.send_event("tick", view.entity().id());
        },
    ));
    scheduler.build();
    scheduler.run(&mut store, 0.016);

    assert_eq!(*hits.lock().unwrap(), 4);
}
