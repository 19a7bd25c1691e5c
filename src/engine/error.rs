//! Error types for command replay, scheduling, and component registration.
//!
//! This module declares focused, composable error types used across the
//! store, command buffer, and scheduler. Each error carries enough context to
//! make failures actionable while remaining small and cheap to pass around.
//!
//! ## Goals
//! * **Specificity:** Each error type models a single failure family
//!   (skipped command opcodes, schedule construction failures, registry
//!   misuse).
//! * **Ergonomics:** All errors implement [`std::error::Error`] and
//!   [`fmt::Display`].
//! * **Actionability:** Structured fields (offending entity ids, the names of
//!   systems left out of a partial plan) make logs useful without reproducing
//!   the issue.
//!
//! ## Policy
//! None of these errors abort the runtime. Skipped opcodes and partial
//! schedules are logged and execution proceeds with what was produced;
//! programming errors (empty access tables, building an empty scheduler) are
//! `debug_assert!`s instead and never reach these types.

use std::fmt;

use crate::engine::types::{ComponentName, EntityId};

/// A command-buffer opcode that could not be applied at flush time.
///
/// Flushing never fails as a whole; the offending opcode is logged and
/// skipped, and the remainder of the stream is replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// `ADD_TO_NEW` was enqueued with no preceding `SPAWN` in the stream.
    MissingSpawn,

    /// A command targeted an entity that no longer exists at flush time,
    /// typically because an earlier opcode in the same stream destroyed it.
    VanishedEntity {
        /// Id the command addressed.
        entity: EntityId,
    },

    /// A component was enqueued without an explicit name and its concrete
    /// type is not in the store's type→name registry.
    UnknownComponentType {
        /// Entity the attach was aimed at.
        entity: EntityId,
    },

    /// An attach failed because the entity already holds a component under
    /// the same name.
    DuplicateComponent {
        /// Owning entity.
        entity: EntityId,
        /// Component name that was already present.
        name: ComponentName,
    },
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::MissingSpawn => {
                f.write_str("ADD_TO_NEW without a preceding SPAWN")
            }
            CommandError::VanishedEntity { entity } => {
                write!(f, "entity {} vanished before the command applied", entity)
            }
            CommandError::UnknownComponentType { entity } => {
                write!(f, "component for entity {} has no registered name", entity)
            }
            CommandError::DuplicateComponent { entity, name } => {
                write!(f, "entity {} already holds component `{}`", entity, name)
            }
        }
    }
}

impl std::error::Error for CommandError {}

/// A non-fatal failure encountered while building an execution plan.
///
/// Both variants leave the dependency builder with a *partial* plan; `run`
/// executes whatever batches were produced. It is the caller's responsibility
/// to inspect these and fix the inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// The ordering graph contains a cycle: the ready queue drained while
    /// systems remained unplaced.
    Cycle {
        /// Names of the systems that could not be placed.
        unplaced: Vec<&'static str>,
    },

    /// A non-empty ready queue admitted nothing into a batch: every remaining
    /// candidate conflicts with every other still pending.
    Deadlock {
        /// Names of the systems still pending when assembly stalled.
        pending: Vec<&'static str>,
    },
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleError::Cycle { unplaced } => {
                write!(f, "dependency cycle; unplaced systems: {}", unplaced.join(", "))
            }
            ScheduleError::Deadlock { pending } => {
                write!(f, "scheduler deadlock; pending systems: {}", pending.join(", "))
            }
        }
    }
}

impl std::error::Error for ScheduleError {}

/// Returned when the store's type→name registry rejects a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// The name is already bound to a different component type.
    NameTaken {
        /// The contested component name.
        name: ComponentName,
    },

    /// The component type is already registered under a different name.
    TypeRegistered {
        /// Rust type name of the already-registered component.
        type_name: &'static str,
        /// Name the type is currently bound to.
        bound_to: ComponentName,
    },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::NameTaken { name } => {
                write!(f, "component name `{}` is bound to another type", name)
            }
            RegistryError::TypeRegistered { type_name, bound_to } => {
                write!(f, "type {} is already registered as `{}`", type_name, bound_to)
            }
        }
    }
}

impl std::error::Error for RegistryError {}
