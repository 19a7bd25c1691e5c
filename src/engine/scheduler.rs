//! # Scheduler
//!
//! Owns the registered system descriptors, the last built execution plan,
//! and the worker pool reference, and drives execution:
//!
//! * per batch, dispatch system bodies across the worker pool and wait at
//!   the join barrier,
//! * at end of tick, flush every system's command buffers against the store
//!   on the calling thread.
//!
//! ## Scheduling model
//!
//! Parallel execution is structured and fork-join: each batch is a scatter
//! across the pool followed by a join. There is no overlap between batches,
//! and none between batch execution and command flushing. `run` blocks the
//! caller until the tick is complete.
//!
//! ## Flushing
//!
//! Commands are flushed at end of tick: since no batch boundary lets a later
//! system read anything through the store that was not committed before the
//! tick started, deferring all structural changes to the tick's end does not
//! weaken the ordering contract. Per system, sub-buffers drain before the
//! root buffer; systems drain in registration order.
//!
//! ## Failure containment
//!
//! The worker pool swallows per-task panics and reports them after the batch
//! join. A failed body cannot invalidate store invariants, because bodies
//! cannot mutate structure directly.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use rayon::prelude::*;

use crate::engine::commands::CommandBuffer;
use crate::engine::schedule::{build_schedule, SchedulePlan};
use crate::engine::store::Store;
use crate::engine::systems::System;
use crate::engine::types::ComponentName;

/// Runs `size` invocations of `body` across the worker pool and blocks the
/// caller until all of them finish.
///
/// This is the only pool primitive the runtime needs; `None` uses rayon's
/// global pool.
pub fn group_task(
    pool: Option<&rayon::ThreadPool>,
    size: usize,
    body: impl Fn(usize) + Send + Sync,
) {
    match pool {
        Some(pool) => pool.install(|| (0..size).into_par_iter().for_each(|index| body(index))),
        None => (0..size).into_par_iter().for_each(|index| body(index)),
    }
}

/// One registered system plus its command buffers.
///
/// A sequential body writes to the single `root` buffer; a parallel body
/// writes one sub-buffer per view record. The sub-buffer array grows to the
/// view size on demand and never shrinks below it.
struct SystemEntry {
    system: Box<dyn System>,
    signature: Box<[ComponentName]>,
    root: Mutex<CommandBuffer>,
    subs: Mutex<Vec<CommandBuffer>>,
}

/// Conflict- and dependency-aware parallel system scheduler.
pub struct Scheduler {
    entries: Vec<SystemEntry>,
    plan: SchedulePlan,
    pool: Option<Arc<rayon::ThreadPool>>,
    dirty: bool,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// Creates an empty scheduler using rayon's global pool.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            plan: SchedulePlan::default(),
            pool: None,
            dirty: true,
        }
    }

    /// Uses a dedicated worker pool instead of the global one.
    pub fn with_pool(mut self, pool: Arc<rayon::ThreadPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Returns the number of registered systems.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no systems are registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes all systems, batches, and dependency state.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.plan = SchedulePlan::default();
        self.dirty = true;
    }

    /// Registers a boxed system descriptor.
    ///
    /// The descriptor must declare a non-empty access table.
    pub fn add_boxed(&mut self, system: Box<dyn System>) {
        debug_assert!(
            !system.access().is_empty(),
            "system `{}` declares no access",
            system.name()
        );
        let signature: Box<[ComponentName]> = system.access().signature().into();
        self.entries.push(SystemEntry {
            system,
            signature,
            root: Mutex::new(CommandBuffer::new()),
            subs: Mutex::new(Vec::new()),
        });
        self.dirty = true;
    }

    /// Registers a concrete system descriptor.
    pub fn add_system<S: System + 'static>(&mut self, system: S) {
        self.add_boxed(Box::new(system));
    }

    /// Registers a list of boxed descriptors.
    pub fn add_systems(&mut self, systems: Vec<Box<dyn System>>) {
        for system in systems {
            self.add_boxed(system);
        }
    }

    /// Returns the last built plan.
    pub fn plan(&self) -> &SchedulePlan {
        &self.plan
    }

    /// Recomputes the execution plan from scratch.
    ///
    /// A single registered descriptor short-circuits to a single-element,
    /// single-batch plan. Idempotent: calling again rebuilds.
    pub fn build(&mut self) -> &SchedulePlan {
        debug_assert!(!self.entries.is_empty(), "build() on an empty scheduler");

        if self.entries.len() == 1 {
            self.plan = SchedulePlan::single(self.entries[0].system.name());
        } else {
            let descriptors: Vec<&dyn System> =
                self.entries.iter().map(|entry| entry.system.as_ref()).collect();
            self.plan = build_schedule(&descriptors);
        }
        self.dirty = false;
        &self.plan
    }

    /// Runs one tick: every batch in plan order, then end-of-tick command
    /// flushing.
    ///
    /// Rebuilds the plan first if systems changed since the last build. If
    /// the plan is partial (cycle or deadlock was reported), whatever batches
    /// were produced still execute.
    pub fn run(&mut self, store: &mut Store, delta: f32) {
        if self.entries.is_empty() {
            return;
        }
        if self.dirty {
            self.build();
        }

        // Materialise every descriptor's view up front; during batches the
        // store is shared and no cache may be created.
        for entry in &self.entries {
            store.multi_view(&entry.signature);
        }

        let shared: &Store = store;
        for batch in self.plan.batches() {
            let failures: Mutex<Vec<(&'static str, String)>> = Mutex::new(Vec::new());
            let systems = batch.systems();

            group_task(self.pool.as_deref(), systems.len(), |task| {
                let entry = &self.entries[systems[task]];
                let outcome = catch_unwind(AssertUnwindSafe(|| {
                    execute_entry(entry, shared, delta);
                }));
                if let Err(payload) = outcome {
                    failures
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push((entry.system.name(), panic_message(payload)));
                }
            });

            for (name, message) in failures.into_inner().unwrap_or_else(PoisonError::into_inner)
            {
                log::error!("system `{}` failed: {}", name, message);
            }
        }

        // End-of-tick finalisation: drain sub-buffers before the root buffer,
        // systems in registration order.
        for entry in &mut self.entries {
            let subs = entry.subs.get_mut().unwrap_or_else(PoisonError::into_inner);
            for buffer in subs.iter_mut() {
                buffer.flush(store);
            }
            let root = entry.root.get_mut().unwrap_or_else(PoisonError::into_inner);
            root.flush(store);
        }
    }
}

/// Executes one system for the tick.
fn execute_entry(entry: &SystemEntry, store: &Store, delta: f32) {
    let Some(view) = store.cached_view(&entry.signature) else {
        return;
    };
    if view.is_empty() {
        return;
    }

    if entry.system.parallel() {
        let mut subs = entry
            .subs
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if subs.len() < view.len() {
            subs.resize_with(view.len(), CommandBuffer::new);
        }
        subs[..view.len()]
            .par_iter_mut()
            .zip(view.records().par_iter())
            .for_each(|(buffer, record)| {
                entry.system.view_components(record, buffer, delta);
            });
    } else {
        let mut root = entry
            .root
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for record in view.records() {
            entry.system.view_components(record, &mut root, delta);
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
