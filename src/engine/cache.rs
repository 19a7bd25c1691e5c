//! # Reactive Query Caches
//!
//! A query cache is a materialised view of every live entity whose component
//! set is a superset of a normalised *signature* (sorted, deduplicated
//! component names). The store creates caches lazily the first time a
//! signature is queried and keeps them consistent by notifying them on every
//! component add and remove.
//!
//! ## Invariants
//! - After any completed store mutation, `records` contains exactly one
//!   record per live entity whose component set ⊇ signature; no duplicates.
//! - The view's identity is stable across mutations: observers resolve the
//!   same signature later and see admissions and evictions reflected in
//!   place.
//!
//! ## Maintenance
//! - **Initial build** enumerates the smallest per-type component list in the
//!   signature and admits each candidate iff every other name is present:
//!   `O(min|C_i|)` admission checks, each `O(|signature|)`.
//! - **Incremental admission** on add, when the entity now satisfies the full
//!   signature.
//! - **Eviction** on remove uses swap-with-last then pop, keeping the
//!   operation O(1); the swapped-in record's id→index entry is rewritten.
//!
//! ## Concurrency
//! Caches mutate only in response to store notifications, which are emitted
//! only during single-threaded command flush. During a parallel batch, views
//! are read-only snapshots.

use std::collections::HashMap;

use atomic_refcell::{AtomicRef, AtomicRefMut};

use crate::engine::component::{Component, SharedComponent};
use crate::engine::entity::Entity;
use crate::engine::store::ComponentMaps;
use crate::engine::types::{ComponentName, EntityId};

/// One row of a materialised view: the entity handle plus the current
/// component instance for each name in the signature.
#[derive(Clone, Debug)]
pub struct ViewRecord {
    entity: Entity,
    components: Vec<SharedComponent>,
}

impl ViewRecord {
    /// Returns the entity this record describes.
    #[inline]
    pub fn entity(&self) -> Entity {
        self.entity
    }

    /// Returns the component attached under `name`, if `name` is part of the
    /// signature.
    pub fn get(&self, name: ComponentName) -> Option<&SharedComponent> {
        self.components.iter().find(|slot| slot.name() == name)
    }

    /// Borrows the component under `name` as a `T`.
    ///
    /// ## Panics
    /// Panics if `name` is not in the signature or the component is not a
    /// `T`.
    pub fn read<T: Component>(&self, name: ComponentName) -> AtomicRef<'_, T> {
        self.component(name).read::<T>()
    }

    /// Exclusively borrows the component under `name` as a `T`.
    ///
    /// The caller must hold `READ_WRITE` access to `name`.
    ///
    /// ## Panics
    /// Panics if `name` is not in the signature or the component is not a
    /// `T`.
    pub fn write<T: Component>(&self, name: ComponentName) -> AtomicRefMut<'_, T> {
        self.component(name).write::<T>()
    }

    /// Returns the record's components in signature order.
    pub fn components(&self) -> &[SharedComponent] {
        &self.components
    }

    fn component(&self, name: ComponentName) -> &SharedComponent {
        self.get(name)
            .expect("component name not part of the view signature")
    }
}

/// Materialised result of a multi-component signature query.
pub struct View {
    signature: Box<[ComponentName]>,
    records: Vec<ViewRecord>,
    by_entity: HashMap<EntityId, usize>,
}

impl View {
    /// Creates an empty view for a normalised signature.
    pub(crate) fn new(signature: Box<[ComponentName]>) -> Self {
        debug_assert!(signature.windows(2).all(|w| w[0] < w[1]));
        Self {
            signature,
            records: Vec::new(),
            by_entity: HashMap::new(),
        }
    }

    /// Returns the normalised signature this view is keyed by.
    pub fn signature(&self) -> &[ComponentName] {
        &self.signature
    }

    /// Returns the current records. Order is unspecified and changes on
    /// eviction.
    pub fn records(&self) -> &[ViewRecord] {
        &self.records
    }

    /// Returns the number of matching entities.
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if no entity matches the signature.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns `true` if `entity` is currently in the view.
    pub fn contains(&self, entity: Entity) -> bool {
        self.by_entity.contains_key(&entity.id())
    }

    /// Rebuilds the view from scratch against the store's component maps.
    ///
    /// Enumerates the smallest per-type list in the signature; every other
    /// name acts as a membership filter.
    pub(crate) fn rebuild(&mut self, maps: &ComponentMaps) {
        self.records.clear();
        self.by_entity.clear();

        let Some(anchor) = self
            .signature
            .iter()
            .min_by_key(|name| maps.get(**name).map_or(0, |m| m.len()))
        else {
            return;
        };
        let Some(anchor_map) = maps.get(*anchor) else {
            return;
        };

        let candidates: Vec<EntityId> = anchor_map.keys().copied().collect();
        for entity in candidates {
            self.try_admit(entity, maps);
        }
    }

    /// Reacts to one completed component change on the store.
    ///
    /// Changes naming components outside the signature are ignored.
    pub(crate) fn on_component_changed(
        &mut self,
        entity: EntityId,
        name: ComponentName,
        added: bool,
        maps: &ComponentMaps,
    ) {
        if self.signature.binary_search(&name).is_err() {
            return;
        }

        if added {
            self.try_admit(entity, maps);
        } else {
            self.evict(entity);
        }
    }

    fn try_admit(&mut self, entity: EntityId, maps: &ComponentMaps) {
        if self.by_entity.contains_key(&entity) {
            return;
        }

        let mut components = Vec::with_capacity(self.signature.len());
        for name in self.signature.iter() {
            match maps.get(*name).and_then(|m| m.get(&entity)) {
                Some(slot) => components.push(slot.clone()),
                None => return,
            }
        }

        log::trace!("view {:?}: admit entity {}", self.signature, entity);
        self.by_entity.insert(entity, self.records.len());
        self.records.push(ViewRecord {
            entity: Entity::from_raw(entity),
            components,
        });
    }

    fn evict(&mut self, entity: EntityId) {
        let Some(index) = self.by_entity.remove(&entity) else {
            return;
        };

        log::trace!("view {:?}: evict entity {}", self.signature, entity);
        self.records.swap_remove(index);
        if index < self.records.len() {
            let moved = self.records[index].entity.id();
            self.by_entity.insert(moved, index);
        }
    }
}
