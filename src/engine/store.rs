//! # The Store
//!
//! Central world type owning entity identity, name-keyed component storage,
//! the per-entity component index, the reactive query-cache registry, the
//! observer registry, and the event dispatcher.
//!
//! ## Index agreement
//! For every live entity `e` and component name `n` the three indices always
//! agree:
//!
//! ```text
//! has_component(e, n)  ⇔  n ∈ entity_index[e]  ⇔  e ∈ components[n]
//! ```
//!
//! Every mutation path updates both indices before any notification fires.
//!
//! ## Mutation discipline
//! Structural mutation (`create_entity`, `add_component`, …) requires
//! `&mut Store` and therefore happens on a single thread, in practice the
//! command-flush thread. During a parallel batch the store is `&`-shared:
//! bodies read views and mutate component interiors they declared
//! `READ_WRITE`, nothing else.
//!
//! ## Notification order
//! On add: indices updated → component stamped → observers fired → every
//! cache whose signature contains the name informed. Remove is symmetric.
//! Destroying an entity removes all its components (firing remove
//! notifications) before the entity row disappears.

use std::collections::{BTreeSet, HashMap};

use crate::engine::cache::View;
use crate::engine::component::{Component, ComponentNames, ComponentSlot, SharedComponent};
use crate::engine::entity::{Entity, EntityTable};
use crate::engine::error::RegistryError;
use crate::engine::events::EventDispatcher;
use crate::engine::query::QueryBuilder;
use crate::engine::types::{normalize_signature, ComponentName, EntityId, NO_ENTITY};

/// Per-type component maps: `name → (entity id → attached component)`.
pub(crate) type ComponentMaps = HashMap<ComponentName, HashMap<EntityId, SharedComponent>>;

/// Identifies one registered observer for removal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ObserverId(u64);

/// Receives component add/remove notifications from a store.
///
/// Notifications fire synchronously during single-threaded structural
/// mutation, after the indices are updated and before cache maintenance.
/// Observers must not call back into the store.
pub trait StoreObserver: Send + Sync {
    /// A component was attached to `entity`.
    fn component_added(&mut self, _entity: Entity, _component: &SharedComponent) {}

    /// A component was detached from `entity`.
    fn component_removed(&mut self, _entity: Entity, _component: &SharedComponent) {}
}

/// In-memory store of entities and typed components.
#[derive(Default)]
pub struct Store {
    entities: EntityTable,
    components: ComponentMaps,
    entity_index: HashMap<EntityId, BTreeSet<ComponentName>>,
    caches: HashMap<Box<[ComponentName]>, View>,
    names: ComponentNames,
    observers: Vec<(ObserverId, Box<dyn StoreObserver>)>,
    next_observer: u64,
    events: EventDispatcher,
}

impl Store {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops all entities, components, and query caches.
    ///
    /// The type→name registry, observers, and event listeners survive; they
    /// are startup configuration, not world state.
    pub fn clear(&mut self) {
        self.entities.clear();
        self.components.clear();
        self.entity_index.clear();
        self.caches.clear();
    }

    // ─── Registry ───────────────────────────────────────────────────────────

    /// Binds component type `T` to `name` in this store's registry.
    pub fn register_component<T: Component>(
        &mut self,
        name: ComponentName,
    ) -> Result<(), RegistryError> {
        self.names.register::<T>(name)
    }

    /// Resolves the registered name of a component instance.
    pub fn component_name_of(&self, component: &dyn Component) -> Option<ComponentName> {
        self.names.name_of_value(component)
    }

    /// Returns the registry itself, for introspection.
    pub fn names(&self) -> &ComponentNames {
        &self.names
    }

    // ─── Entities ───────────────────────────────────────────────────────────

    /// Creates an entity with the next allocated id.
    pub fn create_entity(&mut self) -> Entity {
        let id = self.entities.allocate();
        self.entity_index.insert(id, BTreeSet::new());
        Entity::from_raw(id)
    }

    /// Creates an entity at a caller-chosen id.
    ///
    /// `0` means "allocate the next id". If an entity already exists at `id`
    /// it is destroyed first, with all the usual remove notifications.
    pub fn create_entity_at(&mut self, id: EntityId) -> Entity {
        if id == NO_ENTITY {
            return self.create_entity();
        }
        if self.entities.contains(id) {
            self.remove_entity(id);
        }
        self.entities.insert(id);
        self.entity_index.insert(id, BTreeSet::new());
        Entity::from_raw(id)
    }

    /// Removes an entity and all its components. Returns whether it existed.
    ///
    /// Component removal notifications fire before the entity row disappears.
    pub fn remove_entity(&mut self, id: EntityId) -> bool {
        if !self.entities.contains(id) {
            return false;
        }
        self.remove_all_components(id);
        self.entity_index.remove(&id);
        self.entities.remove(id)
    }

    /// Removes the entity behind `entity` and invalidates the handle.
    pub fn destroy_entity(&mut self, entity: &mut Entity) -> bool {
        let existed = self.remove_entity(entity.id());
        entity.invalidate();
        existed
    }

    /// Returns `true` if `id` is live.
    pub fn has_entity(&self, id: EntityId) -> bool {
        self.entities.contains(id)
    }

    /// Returns a handle to `id` if it is live.
    pub fn get_entity(&self, id: EntityId) -> Option<Entity> {
        self.entities.contains(id).then(|| Entity::from_raw(id))
    }

    /// Returns `true` if `entity` is non-null and live.
    pub fn is_live(&self, entity: Entity) -> bool {
        !entity.is_null() && self.entities.contains(entity.id())
    }

    /// Iterates over all live entity ids. Order is unspecified.
    pub fn entity_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.ids()
    }

    /// Returns the number of live entities.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Returns the id allocation watermark (last allocated id).
    ///
    /// Snapshot collaborators persist this so a restored store reproduces id
    /// allocation semantics.
    pub fn last_entity_id(&self) -> EntityId {
        self.entities.last_id()
    }

    /// Overwrites the id allocation watermark.
    pub fn set_last_entity_id(&mut self, id: EntityId) {
        self.entities.set_last_id(id);
    }

    // ─── Components ─────────────────────────────────────────────────────────

    /// Attaches `component` to `id` under `name`.
    ///
    /// Fails (returns `false`) if `id` is not live or the entity already
    /// holds a component under `name`. On success both indices are updated,
    /// the component is stamped with its name and owner, observers fire, and
    /// every cache whose signature contains `name` is informed.
    pub fn add_component(
        &mut self,
        id: EntityId,
        name: ComponentName,
        component: Box<dyn Component>,
    ) -> bool {
        if !self.entities.contains(id) {
            return false;
        }
        let index = self.entity_index.entry(id).or_default();
        if index.contains(name) {
            return false;
        }

        let slot = ComponentSlot::attach(name, id, component);
        index.insert(name);
        self.components
            .entry(name)
            .or_default()
            .insert(id, slot.clone());

        let entity = Entity::from_raw(id);
        for (_, observer) in self.observers.iter_mut() {
            observer.component_added(entity, &slot);
        }

        let components = &self.components;
        for cache in self.caches.values_mut() {
            cache.on_component_changed(id, name, true, components);
        }
        true
    }

    /// Attaches `component` to `id`, deducing its name from the registry.
    ///
    /// Fails if the concrete type was never registered.
    pub fn add(&mut self, id: EntityId, component: Box<dyn Component>) -> bool {
        match self.names.name_of_value(component.as_ref()) {
            Some(name) => self.add_component(id, name, component),
            None => false,
        }
    }

    /// Detaches the component under `name` from `id`.
    ///
    /// Returns whether a component was removed. On success both indices are
    /// updated, observers fire, and relevant caches evict the entity.
    pub fn remove_component(&mut self, id: EntityId, name: ComponentName) -> bool {
        let Some(slot) = self
            .components
            .get_mut(name)
            .and_then(|map| map.remove(&id))
        else {
            return false;
        };
        if let Some(index) = self.entity_index.get_mut(&id) {
            index.remove(name);
        }

        let entity = Entity::from_raw(id);
        for (_, observer) in self.observers.iter_mut() {
            observer.component_removed(entity, &slot);
        }

        let components = &self.components;
        for cache in self.caches.values_mut() {
            cache.on_component_changed(id, name, false, components);
        }
        true
    }

    /// Detaches every component from `id`. Returns whether `id` is live.
    pub fn remove_all_components(&mut self, id: EntityId) -> bool {
        if !self.entities.contains(id) {
            return false;
        }
        // Snapshot of the name set; removal mutates the underlying index.
        let names: Vec<ComponentName> = self
            .entity_index
            .get(&id)
            .map(|index| index.iter().copied().collect())
            .unwrap_or_default();
        for name in names {
            self.remove_component(id, name);
        }
        true
    }

    /// Returns the component attached to `id` under `name`, if any.
    pub fn get_component(&self, id: EntityId, name: ComponentName) -> Option<&SharedComponent> {
        self.components.get(name)?.get(&id)
    }

    /// Iterates over every component attached to `id`, in name order.
    pub fn get_components(&self, id: EntityId) -> impl Iterator<Item = &SharedComponent> + '_ {
        self.entity_index
            .get(&id)
            .into_iter()
            .flat_map(move |names| {
                names
                    .iter()
                    .filter_map(move |name| self.components.get(*name)?.get(&id))
            })
    }

    /// Returns `true` if `id` holds a component under `name`.
    pub fn has_component(&self, id: EntityId, name: ComponentName) -> bool {
        self.entity_index
            .get(&id)
            .is_some_and(|index| index.contains(name))
    }

    /// Linear scan over all components of one type. No filtering, no cache;
    /// each attached instance is visited exactly once, in unspecified order.
    pub fn view(&self, name: ComponentName) -> impl Iterator<Item = &SharedComponent> + '_ {
        self.components
            .get(name)
            .into_iter()
            .flat_map(|map| map.values())
    }

    // ─── Query caches ───────────────────────────────────────────────────────

    /// Returns the materialised view for the normalised signature of `names`,
    /// creating and building the cache on first use.
    ///
    /// Caches live until [`Store::clear`].
    pub fn multi_view(&mut self, names: &[ComponentName]) -> &View {
        let signature: Box<[ComponentName]> = normalize_signature(names).into();
        let components = &self.components;
        self.caches.entry(signature.clone()).or_insert_with(|| {
            log::debug!("building query cache for {:?}", signature);
            let mut view = View::new(signature);
            view.rebuild(components);
            view
        })
    }

    /// Returns the view for `names` if its cache already exists.
    ///
    /// Used during parallel batches, where the store is `&`-shared and no
    /// cache may be created.
    pub fn cached_view(&self, names: &[ComponentName]) -> Option<&View> {
        let signature = normalize_signature(names);
        self.caches.get(signature.as_slice())
    }

    /// Starts an immediate-mode query against this store.
    pub fn query(&mut self) -> QueryBuilder<'_> {
        QueryBuilder::new(self)
    }

    // ─── Observers and events ───────────────────────────────────────────────

    /// Registers an observer for component add/remove notifications.
    pub fn add_observer(&mut self, observer: Box<dyn StoreObserver>) -> ObserverId {
        self.next_observer += 1;
        let id = ObserverId(self.next_observer);
        self.observers.push((id, observer));
        id
    }

    /// Removes a previously registered observer.
    pub fn remove_observer(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer_id, _)| *observer_id != id);
        self.observers.len() != before
    }

    /// Returns the store's event dispatcher.
    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    /// Returns the store's event dispatcher for mutation.
    pub fn events_mut(&mut self) -> &mut EventDispatcher {
        &mut self.events
    }
}
