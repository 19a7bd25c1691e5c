//! # Deferred Command Buffers
//!
//! A command buffer is an append-only log of deferred structural mutations
//! (entity spawn/destroy, component add/remove, deferred callables) plus
//! batched events. Buffers are the only conduit for structural changes
//! during parallel execution: bodies append on any thread, buffers are
//! merged on any thread, and a buffer is flushed against the store on a
//! single thread.
//!
//! ## Guarantees
//! - **Sequential consistency at flush**: within one buffer, effects become
//!   visible in the exact order they were enqueued. A `DEFER` callable
//!   observes all prior operations in the same stream as having happened.
//! - **Merge is append**: merging buffer B into A is equivalent to executing
//!   A's stream then B's. Event payload order within a name follows merge
//!   order; ordering between different names is unspecified.
//! - **Missing referents are non-fatal**: an opcode that targets a vanished
//!   entity (or `ADD_TO_NEW` with no preceding `SPAWN`) is logged and
//!   skipped; the rest of the stream still applies.

use std::any::Any;
use std::collections::HashMap;

use crate::engine::component::Component;
use crate::engine::entity::Entity;
use crate::engine::error::CommandError;
use crate::engine::store::Store;
use crate::engine::types::{ComponentName, EntityId, EventName};

/// Type-erased event payload carried by a buffer.
pub use crate::engine::events::EventPayload;

/// Boxed callable invoked on the flush thread by a `DEFER` opcode.
pub type DeferredFn = Box<dyn FnOnce(&mut Store) + Send>;

/// One deferred operation in a buffer's opcode stream.
pub enum Command {
    /// Create a new entity; it becomes the "current spawn" for the remainder
    /// of the stream until the next `Spawn`.
    Spawn,

    /// Attach to the current spawn. A `None` name is deduced from the
    /// component's registered type.
    AddToNew {
        /// Explicit component name, or `None` to deduce.
        name: Option<ComponentName>,
        /// The free component instance to attach.
        component: Box<dyn Component>,
    },

    /// Attach to an explicit entity.
    Add {
        /// Target entity id.
        entity: EntityId,
        /// Explicit component name, or `None` to deduce.
        name: Option<ComponentName>,
        /// The free component instance to attach.
        component: Box<dyn Component>,
    },

    /// Detach a named component from an explicit entity.
    Remove {
        /// Target entity id.
        entity: EntityId,
        /// Component name to detach.
        name: ComponentName,
    },

    /// Detach every component from an entity.
    RemoveAll {
        /// Target entity id.
        entity: EntityId,
    },

    /// Remove an entity (cascading to its components).
    Destroy {
        /// Target entity id.
        entity: EntityId,
    },

    /// Invoke a callable on the flush thread.
    Defer {
        /// The callable; it observes all earlier stream effects.
        callable: DeferredFn,
    },
}

/// Append-only log of deferred mutations plus batched events.
#[derive(Default)]
pub struct CommandBuffer {
    stream: Vec<Command>,
    events: HashMap<EventName, Vec<EventPayload>>,
}

impl CommandBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if neither opcodes nor events are queued.
    pub fn is_empty(&self) -> bool {
        self.stream.is_empty() && self.events.values().all(|payloads| payloads.is_empty())
    }

    /// Drops all queued opcodes and events without applying them.
    pub fn clear(&mut self) {
        self.stream.clear();
        self.events.clear();
    }

    /// Appends a raw opcode to the stream.
    pub fn push(&mut self, command: Command) {
        self.stream.push(command);
    }

    /// Queues a `SPAWN` and returns a builder scoped to the new entity.
    pub fn spawn(&mut self) -> SpawnBuilder<'_> {
        self.stream.push(Command::Spawn);
        SpawnBuilder { buffer: self }
    }

    /// Returns a builder scoped to an existing entity.
    pub fn entity(&mut self, entity: Entity) -> EntityCommands<'_> {
        EntityCommands {
            entity: entity.id(),
            buffer: self,
        }
    }

    /// Queues a callable to run on the flush thread.
    pub fn defer(&mut self, callable: impl FnOnce(&mut Store) + Send + 'static) {
        self.stream.push(Command::Defer {
            callable: Box::new(callable),
        });
    }

    /// Queues an event payload for batched dispatch at flush time.
    pub fn send_event(&mut self, name: EventName, payload: impl Any + Send) {
        self.events
            .entry(name)
            .or_default()
            .push(Box::new(payload));
    }

    /// Appends another buffer's stream verbatim, then concatenates its
    /// per-event payload lists onto this buffer's. `other` is left empty.
    pub fn merge(&mut self, other: &mut CommandBuffer) {
        self.stream.append(&mut other.stream);
        for (name, mut payloads) in other.events.drain() {
            self.events.entry(name).or_default().append(&mut payloads);
        }
    }

    /// Replays the opcode stream strictly in order, then dispatches each
    /// event name's payloads with a single dispatcher lookup per name. Both
    /// streams are cleared.
    ///
    /// Must run on the thread that owns the store; this is the only point at
    /// which the buffer's structural changes become visible.
    pub fn flush(&mut self, store: &mut Store) {
        let mut current_spawn: Option<EntityId> = None;

        for command in self.stream.drain(..) {
            match command {
                Command::Spawn => {
                    current_spawn = Some(store.create_entity().id());
                }
                Command::AddToNew { name, component } => {
                    let Some(entity) = current_spawn else {
                        log::warn!("skipping opcode: {}", CommandError::MissingSpawn);
                        continue;
                    };
                    attach(store, entity, name, component);
                }
                Command::Add {
                    entity,
                    name,
                    component,
                } => {
                    attach(store, entity, name, component);
                }
                Command::Remove { entity, name } => {
                    if !store.remove_component(entity, name) {
                        log::warn!(
                            "skipping opcode: {}",
                            CommandError::VanishedEntity { entity }
                        );
                    }
                }
                Command::RemoveAll { entity } => {
                    if !store.remove_all_components(entity) {
                        log::warn!(
                            "skipping opcode: {}",
                            CommandError::VanishedEntity { entity }
                        );
                    }
                }
                Command::Destroy { entity } => {
                    if !store.remove_entity(entity) {
                        log::warn!(
                            "skipping opcode: {}",
                            CommandError::VanishedEntity { entity }
                        );
                    }
                }
                Command::Defer { callable } => {
                    callable(store);
                }
            }
        }

        for (name, payloads) in std::mem::take(&mut self.events) {
            store.events_mut().dispatch_batch(name, payloads);
        }
    }
}

fn attach(
    store: &mut Store,
    entity: EntityId,
    name: Option<ComponentName>,
    component: Box<dyn Component>,
) {
    if !store.has_entity(entity) {
        log::warn!(
            "skipping opcode: {}",
            CommandError::VanishedEntity { entity }
        );
        return;
    }

    let name = match name.or_else(|| store.component_name_of(component.as_ref())) {
        Some(name) => name,
        None => {
            log::warn!(
                "skipping opcode: {}",
                CommandError::UnknownComponentType { entity }
            );
            return;
        }
    };

    if !store.add_component(entity, name, component) {
        log::warn!(
            "skipping opcode: {}",
            CommandError::DuplicateComponent { entity, name }
        );
    }
}

/// Fluent sub-scope over the most recent `SPAWN` in a buffer.
///
/// The builder never touches the store; it only appends opcodes.
pub struct SpawnBuilder<'b> {
    buffer: &'b mut CommandBuffer,
}

impl SpawnBuilder<'_> {
    /// Attaches `component` to the spawned entity, deducing its name from
    /// the store's registry at flush time.
    pub fn with(self, component: impl Component) -> Self {
        self.buffer.stream.push(Command::AddToNew {
            name: None,
            component: Box::new(component),
        });
        self
    }

    /// Attaches `component` to the spawned entity under an explicit name.
    pub fn with_named(self, name: ComponentName, component: impl Component) -> Self {
        self.buffer.stream.push(Command::AddToNew {
            name: Some(name),
            component: Box::new(component),
        });
        self
    }
}

/// Fluent sub-scope over one existing entity.
///
/// The builder never touches the store; it only appends opcodes.
pub struct EntityCommands<'b> {
    entity: EntityId,
    buffer: &'b mut CommandBuffer,
}

impl EntityCommands<'_> {
    /// Queues an attach, deducing the component's name at flush time.
    pub fn add(self, component: impl Component) -> Self {
        self.buffer.stream.push(Command::Add {
            entity: self.entity,
            name: None,
            component: Box::new(component),
        });
        self
    }

    /// Queues an attach under an explicit name.
    pub fn add_named(self, name: ComponentName, component: impl Component) -> Self {
        self.buffer.stream.push(Command::Add {
            entity: self.entity,
            name: Some(name),
            component: Box::new(component),
        });
        self
    }

    /// Queues detaching the component under `name`.
    pub fn remove(self, name: ComponentName) -> Self {
        self.buffer.stream.push(Command::Remove {
            entity: self.entity,
            name,
        });
        self
    }

    /// Queues detaching every component.
    pub fn remove_all(self) -> Self {
        self.buffer.stream.push(Command::RemoveAll {
            entity: self.entity,
        });
        self
    }

    /// Queues removing the entity itself.
    pub fn destroy(self) {
        self.buffer.stream.push(Command::Destroy {
            entity: self.entity,
        });
    }
}
