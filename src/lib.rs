//! # ECS Runtime
//!
//! Lightweight, data-oriented Entity-Component-System runtime built around
//! three cooperating subsystems:
//!
//! - a name-keyed **store** of entities and components with O(1) indices,
//! - **reactive query caches**: materialised multi-component views kept
//!   consistent as components are added and removed,
//! - a **parallel scheduler** that combines explicit ordering edges, declared
//!   component access, and group priorities into conflict-free execution
//!   batches.
//!
//! Structural changes during parallel execution go through deferred
//! [`CommandBuffer`]s, flushed on a single thread at the end of each tick.
//!
//! ## Design Goals
//! - Declared, not inferred, component access
//! - Maximal batch parallelism under read/write conflict rules
//! - Single-threaded structural mutation with reactive view maintenance
//! - Instance-scoped state: a fresh [`Store`] per simulation, no globals

#![forbid(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![deny(dead_code)]

pub mod engine;

// ─────────────────────────────────────────────────────────────────────────────
// Re-exports (Public API)
// ─────────────────────────────────────────────────────────────────────────────

// Core store types

pub use engine::store::{
    Store,
    StoreObserver,
    ObserverId,
};

pub use engine::entity::{
    Entity,
    EntityTable,
};

pub use engine::component::{
    Archive,
    AsAny,
    Component,
    ComponentSlot,
    ComponentNames,
    SharedComponent,
};

pub use engine::cache::{View, ViewRecord};
pub use engine::query::{QueryBuilder, QueryRow};

pub use engine::commands::{
    Command,
    CommandBuffer,
    SpawnBuilder,
    EntityCommands,
    EventPayload,
};

pub use engine::events::{EventDispatcher, ListenerId};

pub use engine::systems::{System, FnSystem};
pub use engine::schedule::{
    Batch,
    SchedulePlan,
    build_schedule,
};
pub use engine::scheduler::{Scheduler, group_task};

pub use engine::error::{
    CommandError,
    RegistryError,
    ScheduleError,
};

pub use engine::types::{
    Access,
    AccessTable,
    ComponentName,
    EntityId,
    EventName,
    NO_ENTITY,
};

// ─────────────────────────────────────────────────────────────────────────────
// Prelude (Optional but recommended)
// ─────────────────────────────────────────────────────────────────────────────

/// Commonly used runtime types.
///
/// Import with:
/// ```rust
/// use ecs_runtime::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Access,
        AccessTable,
        CommandBuffer,
        Component,
        Entity,
        FnSystem,
        Scheduler,
        Store,
        System,
        ViewRecord,
    };
}
