//! # System Descriptors
//!
//! A **system** is a unit of logic scheduled over the store. Systems:
//! - declare which component types they read and write ([`AccessTable`]),
//! - declare explicit ordering edges (`before` / `after`) and a group
//!   priority used as a tie-breaker during batch assembly,
//! - process matched view records through a body that receives a
//!   thread-local command buffer for structural changes.
//!
//! ## Scheduling Model
//!
//! The dependency builder places systems into **batches** such that no two
//! systems in one batch conflict on component access and every explicit edge
//! crosses a batch boundary. All systems in a batch may run in parallel.
//!
//! Declared access is the source of truth the scheduler trusts. A body that
//! writes through a read-only declaration is a programmer error the
//! scheduler cannot detect and will not prevent.
//!
//! ## Function-backed Systems
//!
//! [`FnSystem`] defines a system from a closure plus a fluent configuration
//! surface, avoiding a named type per system. This is the preferred
//! mechanism for most simulation logic.

use crate::engine::cache::ViewRecord;
use crate::engine::commands::CommandBuffer;
use crate::engine::types::AccessTable;

/// A schedulable unit of logic operating on matched view records.
///
/// Systems must be `Send + Sync` so batches can fan out across worker
/// threads.
pub trait System: Send + Sync {
    /// Returns the system's name, unique within a scheduler.
    fn name(&self) -> &'static str;

    /// Returns the declared component access pattern. Must not be empty.
    fn access(&self) -> &AccessTable;

    /// Names of systems that must run after this one.
    fn before(&self) -> &[&'static str] {
        &[]
    }

    /// Names of systems that must run before this one.
    fn after(&self) -> &[&'static str] {
        &[]
    }

    /// Group priority hint; smaller groups are tried earlier during batch
    /// assembly. Not a barrier.
    fn group(&self) -> i32 {
        0
    }

    /// Whether the per-view work may itself fan out across workers, each
    /// view record receiving its own command sub-buffer.
    fn parallel(&self) -> bool {
        false
    }

    /// Processes one matched view record.
    ///
    /// Structural changes must go through `commands`; the store is shared
    /// and structurally frozen while bodies run.
    fn view_components(&self, view: &ViewRecord, commands: &mut CommandBuffer, delta: f32);
}

/// A concrete [`System`] backed by a function or closure.
///
/// ## Example
/// ```ignore
/// let movement = FnSystem::new(
///     "movement",
///     AccessTable::new().read("Velocity").write("Position"),
///     |view, _commands, delta| {
///         let velocity = view.read::<Velocity>("Velocity");
///         view.write::<Position>("Position").advance(&velocity, delta);
///     },
/// )
/// .after(&["input"])
/// .group(1);
/// ```
pub struct FnSystem<F>
where
    F: Fn(&ViewRecord, &mut CommandBuffer, f32) + Send + Sync + 'static,
{
    name: &'static str,
    access: AccessTable,
    before: Vec<&'static str>,
    after: Vec<&'static str>,
    group: i32,
    parallel: bool,
    f: F,
}

impl<F> FnSystem<F>
where
    F: Fn(&ViewRecord, &mut CommandBuffer, f32) + Send + Sync + 'static,
{
    /// Creates a function-backed system with default ordering (no edges,
    /// group 0, sequential body).
    pub fn new(name: &'static str, access: AccessTable, f: F) -> Self {
        debug_assert!(!access.is_empty(), "system `{}` declares no access", name);
        Self {
            name,
            access,
            before: Vec::new(),
            after: Vec::new(),
            group: 0,
            parallel: false,
            f,
        }
    }

    /// Adds names this system must precede. Chainable.
    pub fn before(mut self, names: &[&'static str]) -> Self {
        self.before.extend_from_slice(names);
        self
    }

    /// Adds names this system must follow. Chainable.
    pub fn after(mut self, names: &[&'static str]) -> Self {
        self.after.extend_from_slice(names);
        self
    }

    /// Sets the group priority hint. Chainable.
    pub fn group(mut self, group: i32) -> Self {
        self.group = group;
        self
    }

    /// Marks the body as internally parallel. Chainable.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

impl<F> System for FnSystem<F>
where
    F: Fn(&ViewRecord, &mut CommandBuffer, f32) + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn access(&self) -> &AccessTable {
        &self.access
    }

    fn before(&self) -> &[&'static str] {
        &self.before
    }

    fn after(&self) -> &[&'static str] {
        &self.after
    }

    fn group(&self) -> i32 {
        self.group
    }

    fn parallel(&self) -> bool {
        self.parallel
    }

    fn view_components(&self, view: &ViewRecord, commands: &mut CommandBuffer, delta: f32) {
        (self.f)(view, commands, delta)
    }
}
