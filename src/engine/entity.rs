//! # Entity Identity and the Entity Table
//!
//! This module defines the entity handle and the table that tracks which ids
//! are live.
//!
//! ## Entity Model
//! An [`Entity`] is a cheap `Copy` handle wrapping a 32-bit id. Id `0` is
//! reserved for "no entity"; a handle holding it is invalid by definition.
//! Liveness is a property of the owning [`crate::Store`], checked with
//! `Store::is_live`; the handle itself carries no liveness state.
//!
//! ## Allocation
//! The table allocates ids by advancing a monotonic watermark. Callers may
//! also claim a specific id (snapshot restore does this); explicit ids
//! advance the watermark past themselves so later allocations never collide.
//!
//! ## Invariants
//! - `0` is never live.
//! - Every id the table has ever allocated is `<= last_id`.

use std::collections::HashSet;

use crate::engine::types::{EntityId, NO_ENTITY};

/// Opaque handle to an entity in a store.
///
/// Cheap to copy and compare. `valid` means the id is non-zero **and** the
/// owning store still lists it as live; the second half of that test lives on
/// the store (`Store::is_live`). Destroying an entity through its handle
/// (`Store::destroy_entity`) zeroes the handle's id.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Entity(EntityId);

impl Entity {
    /// The invalid "no entity" handle.
    pub const NULL: Entity = Entity(NO_ENTITY);

    /// Wraps a raw id. Intended for snapshot collaborators reconstructing
    /// handles; the id is not checked for liveness.
    #[inline]
    pub fn from_raw(id: EntityId) -> Self {
        Entity(id)
    }

    /// Returns the raw id.
    #[inline]
    pub fn id(self) -> EntityId {
        self.0
    }

    /// Returns `true` if this handle holds the reserved "no entity" id.
    #[inline]
    pub fn is_null(self) -> bool {
        self.0 == NO_ENTITY
    }

    /// Zeroes the handle.
    #[inline]
    pub(crate) fn invalidate(&mut self) {
        self.0 = NO_ENTITY;
    }
}

/// Tracks live entity ids and the allocation watermark.
///
/// ## Concurrency
/// Not thread-safe; the owning store mutates it only on the flush thread.
#[derive(Default)]
pub struct EntityTable {
    live: HashSet<EntityId>,
    last_id: EntityId,
}

impl EntityTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next id and marks it live.
    pub fn allocate(&mut self) -> EntityId {
        debug_assert!(self.last_id < EntityId::MAX, "entity id space exhausted");
        self.last_id += 1;
        debug_assert!(!self.live.contains(&self.last_id));
        self.live.insert(self.last_id);
        self.last_id
    }

    /// Marks a caller-chosen id live, advancing the watermark past it.
    ///
    /// The id must be non-zero and not currently live.
    pub fn insert(&mut self, id: EntityId) {
        debug_assert!(id != NO_ENTITY, "entity id 0 is reserved");
        debug_assert!(!self.live.contains(&id));
        self.live.insert(id);
        if id > self.last_id {
            self.last_id = id;
        }
    }

    /// Removes `id` from the live set. Returns whether it was live.
    pub fn remove(&mut self, id: EntityId) -> bool {
        self.live.remove(&id)
    }

    /// Returns `true` if `id` is live.
    #[inline]
    pub fn contains(&self, id: EntityId) -> bool {
        self.live.contains(&id)
    }

    /// Iterates over all live ids. Order is unspecified.
    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.live.iter().copied()
    }

    /// Returns the number of live entities.
    #[inline]
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Returns `true` if no entities are live.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Returns the last allocated id (the allocation watermark).
    #[inline]
    pub fn last_id(&self) -> EntityId {
        self.last_id
    }

    /// Overwrites the allocation watermark.
    ///
    /// Snapshot restore uses this to reproduce id allocation semantics. The
    /// caller is responsible for not rewinding the watermark below a live id.
    #[inline]
    pub fn set_last_id(&mut self, id: EntityId) {
        self.last_id = id;
    }

    /// Drops all live ids and resets the watermark.
    pub fn clear(&mut self) {
        self.live.clear();
        self.last_id = NO_ENTITY;
    }
}
