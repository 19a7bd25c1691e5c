//! Named-channel event dispatch.
//!
//! Pub/sub over named events, used by the command buffer's event batching.
//! Listeners are registered per channel; dispatching to a name nobody
//! subscribed to is silently ignored (normal control flow).
//!
//! Rust closures are not comparable, so `add_listener` hands back a
//! [`ListenerId`] and removal is by id rather than by callable identity.

use std::any::Any;
use std::collections::HashMap;

use crate::engine::types::EventName;

/// Type-erased event payload.
pub type EventPayload = Box<dyn Any + Send>;

type Listener = Box<dyn FnMut(&EventPayload) + Send + Sync>;

/// Identifies one registered listener for removal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ListenerId(u64);

/// Per-name listener registry with ordered dispatch.
///
/// Listeners on one channel fire in registration order. Payload order within
/// a batch follows the batch's own order; ordering *between* channels is
/// unspecified.
#[derive(Default)]
pub struct EventDispatcher {
    channels: HashMap<EventName, Vec<(ListenerId, Listener)>>,
    next_id: u64,
}

impl EventDispatcher {
    /// Creates a dispatcher with no channels.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `listener` to `name` and returns its removal id.
    pub fn add_listener(
        &mut self,
        name: EventName,
        listener: impl FnMut(&EventPayload) + Send + Sync + 'static,
    ) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.channels
            .entry(name)
            .or_default()
            .push((id, Box::new(listener)));
        id
    }

    /// Unsubscribes a listener. Returns whether it was registered on `name`.
    pub fn remove_listener(&mut self, name: EventName, id: ListenerId) -> bool {
        let Some(listeners) = self.channels.get_mut(name) else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Returns `true` if anyone is subscribed to `name`.
    pub fn has_listeners(&self, name: EventName) -> bool {
        self.channels.get(name).is_some_and(|l| !l.is_empty())
    }

    /// Delivers one payload to every listener on `name`.
    pub fn dispatch(&mut self, name: EventName, payload: &EventPayload) {
        if let Some(listeners) = self.channels.get_mut(name) {
            for (_, listener) in listeners.iter_mut() {
                listener(payload);
            }
        }
    }

    /// Delivers a batch of payloads to `name` with a single channel lookup.
    ///
    /// Payloads arrive in batch order.
    pub fn dispatch_batch(&mut self, name: EventName, payloads: Vec<EventPayload>) {
        let Some(listeners) = self.channels.get_mut(name) else {
            return;
        };
        for payload in &payloads {
            for (_, listener) in listeners.iter_mut() {
                listener(payload);
            }
        }
    }
}
