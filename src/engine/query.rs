//! Immediate-mode query construction and execution.
//!
//! This module provides a *builder-style* API for ad-hoc filters on top of
//! the store's reactive caches, plus a union scan for queries anchored on
//! "any of" rather than "all of".
//!
//! ## Execution rules
//! 1. A non-empty `with` clause anchors the query on the cache for its
//!    normalised signature; `without`, `any_of`, and `filter` reject records.
//! 2. Otherwise a non-empty `any_of` clause unions the per-type lists of its
//!    names, deduplicating by entity id; `without` and `filter` reject
//!    candidates. Each row carries one field per `any_of` name, absent when
//!    the entity lacks that component.
//! 3. Otherwise the result is empty; "all entities" is deliberately not
//!    supported.

use std::collections::HashSet;

use atomic_refcell::AtomicRef;

use crate::engine::component::{Component, SharedComponent};
use crate::engine::entity::Entity;
use crate::engine::store::Store;
use crate::engine::types::{normalize_signature, ComponentName, EntityId};

/// One row of a query result: the entity plus one optional field per
/// requested component name.
///
/// Rows from a `with`-anchored query always have every field present; rows
/// from an `any_of` query may have absent fields.
pub struct QueryRow {
    entity: Entity,
    fields: Vec<(ComponentName, Option<SharedComponent>)>,
}

impl QueryRow {
    /// Returns the matched entity.
    #[inline]
    pub fn entity(&self) -> Entity {
        self.entity
    }

    /// Returns the component under `name`, if the row carries it.
    pub fn get(&self, name: ComponentName) -> Option<&SharedComponent> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .and_then(|(_, slot)| slot.as_ref())
    }

    /// Returns `true` if the row carries a component under `name`.
    pub fn has(&self, name: ComponentName) -> bool {
        self.get(name).is_some()
    }

    /// Borrows the component under `name` as a `T`.
    ///
    /// ## Panics
    /// Panics if the row does not carry `name` or the component is not a `T`.
    pub fn read<T: Component>(&self, name: ComponentName) -> AtomicRef<'_, T> {
        self.get(name)
            .expect("component name not present in this query row")
            .read::<T>()
    }
}

/// Builder for ad-hoc entity queries.
///
/// Clauses accumulate by value; [`QueryBuilder::exec`] consumes the builder
/// so a query definition cannot be reused stale.
///
/// ## Example
/// ```ignore
/// let wounded = store
///     .query()
///     .with(&["Health"])
///     .without(&["Shield"])
///     .filter(|row| row.read::<Health>("Health").value < 20)
///     .exec();
/// ```
pub struct QueryBuilder<'w> {
    store: &'w mut Store,
    with: Vec<ComponentName>,
    without: Vec<ComponentName>,
    any_of: Vec<ComponentName>,
    filter: Option<Box<dyn Fn(&QueryRow) -> bool + 'w>>,
}

impl<'w> QueryBuilder<'w> {
    pub(crate) fn new(store: &'w mut Store) -> Self {
        Self {
            store,
            with: Vec::new(),
            without: Vec::new(),
            any_of: Vec::new(),
            filter: None,
        }
    }

    /// Requires every name in `names` to be present (AND anchor).
    pub fn with(mut self, names: &[ComponentName]) -> Self {
        self.with.extend_from_slice(names);
        self
    }

    /// Rejects entities holding any name in `names`.
    pub fn without(mut self, names: &[ComponentName]) -> Self {
        self.without.extend_from_slice(names);
        self
    }

    /// Requires at least one name in `names` to be present (OR anchor).
    pub fn any_of(mut self, names: &[ComponentName]) -> Self {
        self.any_of.extend_from_slice(names);
        self
    }

    /// Rejects rows for which `predicate` returns `false`.
    pub fn filter(mut self, predicate: impl Fn(&QueryRow) -> bool + 'w) -> Self {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Runs the query and returns the matching rows.
    pub fn exec(self) -> Vec<QueryRow> {
        if !self.with.is_empty() {
            return self.exec_with();
        }
        if !self.any_of.is_empty() {
            return self.exec_any_of();
        }
        Vec::new()
    }

    fn exec_with(self) -> Vec<QueryRow> {
        let signature = normalize_signature(&self.with);
        self.store.multi_view(&signature);

        let store: &Store = self.store;
        let view = store
            .cached_view(&signature)
            .expect("cache exists after multi_view");

        let mut rows = Vec::new();
        for record in view.records() {
            let id = record.entity().id();
            if self.without.iter().any(|name| store.has_component(id, *name)) {
                continue;
            }
            if !self.any_of.is_empty()
                && !self.any_of.iter().any(|name| store.has_component(id, *name))
            {
                continue;
            }

            let row = QueryRow {
                entity: record.entity(),
                fields: record
                    .components()
                    .iter()
                    .map(|slot| (slot.name(), Some(slot.clone())))
                    .collect(),
            };
            if self.filter.as_ref().is_some_and(|keep| !keep(&row)) {
                continue;
            }
            rows.push(row);
        }
        rows
    }

    fn exec_any_of(self) -> Vec<QueryRow> {
        let names = normalize_signature(&self.any_of);
        let store: &Store = self.store;

        let mut seen: HashSet<EntityId> = HashSet::new();
        let mut candidates: Vec<EntityId> = Vec::new();
        for name in &names {
            for slot in store.view(*name) {
                if seen.insert(slot.owner()) {
                    candidates.push(slot.owner());
                }
            }
        }

        let mut rows = Vec::new();
        for id in candidates {
            if self.without.iter().any(|name| store.has_component(id, *name)) {
                continue;
            }

            let row = QueryRow {
                entity: Entity::from_raw(id),
                fields: names
                    .iter()
                    .map(|name| (*name, store.get_component(id, *name).cloned()))
                    .collect(),
            };
            if self.filter.as_ref().is_some_and(|keep| !keep(&row)) {
                continue;
            }
            rows.push(row);
        }
        rows
    }
}
