//! Event bus
//!
//! Every object owns a table of named events. Connections are kept in the
//! order they were made and handlers are called synchronously, in that order,
//! when the event is emitted. A receiver has at most one connection per
//! event of a given emitter; connecting again replaces the handler in place.
//!
//! Dispatch is protected against feedback loops: a handler that is already
//! running is not entered again, and nesting of the same event on the same
//! emitter is capped by [`RuntimeConfig::emit_depth_limit`].
//!
//! [`RuntimeConfig::emit_depth_limit`]: crate::config::RuntimeConfig::emit_depth_limit

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::error::{ObjectError, Result};
use crate::log::LogLevel;
use crate::object::ObjectId;
use crate::runtime::Runtime;
use crate::value::Value;

/// Events every object has
pub mod event_names {
    /// Emitted between `Initialized` and `Running`
    pub const INITIALIZATION: &str = "initialization";
    /// Emitted on entering `Stopping`
    pub const DESTRUCTION: &str = "destruction";
    /// Emitted on entering `Destroyed`, after termination hooks
    pub const TERMINATION: &str = "termination";
    /// Emitted on a holder when an object it references dies; carries the
    /// dead object's handle
    pub const REFERENCE_GONE: &str = "referenceGone";
    /// Carries the new parent, or null
    pub const PARENT_CHANGED: &str = "parentChanged";
    pub const CHILDREN_CHANGED: &str = "childrenChanged";

    pub const BUILTIN: [&str; 6] = [
        INITIALIZATION,
        DESTRUCTION,
        TERMINATION,
        REFERENCE_GONE,
        PARENT_CHANGED,
        CHILDREN_CHANGED,
    ];
}

/// Result of an event handler; errors are logged by the dispatcher
pub type HandlerResult = anyhow::Result<()>;

type Handler = Rc<RefCell<dyn FnMut(&mut Runtime, &[Value]) -> HandlerResult>>;

/// Called as `(runtime, emitter, receiver)` whenever a connection is made
pub type ConnectionMonitor = Rc<dyn Fn(&mut Runtime, ObjectId, ObjectId)>;

pub(crate) struct Connection {
    key: u64,
    receiver: ObjectId,
    handler: Handler,
}

#[derive(Default)]
pub(crate) struct EventSlot {
    connections: SmallVec<[Connection; 2]>,
    monitor: Option<ConnectionMonitor>,
    depth: u32,
}

/// Per-object event table
#[derive(Default)]
pub struct EventBus {
    slots: FxHashMap<String, EventSlot>,
}

impl EventBus {
    pub(crate) fn with_builtins() -> Self {
        let mut bus = Self::default();
        for name in event_names::BUILTIN {
            bus.slots.insert(name.to_string(), EventSlot::default());
        }
        bus
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    /// Number of connections over all events
    pub fn connection_count(&self) -> usize {
        self.slots.values().map(|s| s.connections.len()).sum()
    }

    fn connects_to(&self, receiver: ObjectId) -> bool {
        self.slots
            .values()
            .any(|s| s.connections.iter().any(|c| c.receiver == receiver))
    }

    fn has_key(&self, event: &str, key: u64) -> bool {
        self.slots
            .get(event)
            .is_some_and(|s| s.connections.iter().any(|c| c.key == key))
    }
}

/// A callback that only runs while its owner is alive.
///
/// Hand these to code that calls back later, after the owner may have been
/// destroyed.
pub struct SafeCallback<F> {
    owner: ObjectId,
    callback: F,
}

impl<F> SafeCallback<F>
where
    F: FnMut(&mut Runtime, &[Value]),
{
    /// Invoke the callback; returns `false` without calling it if the owner
    /// is destroyed
    pub fn call(&mut self, rt: &mut Runtime, args: &[Value]) -> bool {
        if !rt.is_alive(self.owner) {
            tracing::trace!(owner = ?self.owner, "safe callback skipped");
            return false;
        }
        (self.callback)(rt, args);
        true
    }

    pub fn owner(&self) -> ObjectId {
        self.owner
    }
}

impl Runtime {
    /// Add an event to `id`
    pub fn register_event(&mut self, id: ObjectId, name: &str) -> Result<()> {
        self.register_event_slot(id, name, None)
    }

    /// Add an event whose `monitor` is told about every new connection
    pub fn register_event_with_monitor<F>(&mut self, id: ObjectId, name: &str, monitor: F) -> Result<()>
    where
        F: Fn(&mut Runtime, ObjectId, ObjectId) + 'static,
    {
        self.register_event_slot(id, name, Some(Rc::new(monitor)))
    }

    fn register_event_slot(
        &mut self,
        id: ObjectId,
        name: &str,
        monitor: Option<ConnectionMonitor>,
    ) -> Result<()> {
        self.ensure_alive(id)?;
        let record = self.objects.get_mut(id).ok_or(ObjectError::Destroyed(id))?;
        if record.events.contains(name) || record.properties.contains(name) {
            return Err(ObjectError::DuplicateName {
                object: id,
                name: name.to_string(),
            });
        }
        record.events.slots.insert(
            name.to_string(),
            EventSlot {
                monitor,
                ..EventSlot::default()
            },
        );
        Ok(())
    }

    pub fn has_event(&self, id: ObjectId, name: &str) -> bool {
        self.objects.get(id).is_some_and(|r| r.events.contains(name))
    }

    /// Connect an infallible handler; see [`Runtime::try_connect`]
    pub fn connect<F>(&mut self, emitter: ObjectId, event: &str, receiver: ObjectId, mut handler: F) -> Result<()>
    where
        F: FnMut(&mut Runtime, &[Value]) + 'static,
    {
        self.try_connect(emitter, event, receiver, move |rt, args| {
            handler(rt, args);
            Ok(())
        })
    }

    /// Connect `handler` on behalf of `receiver` to `event` of `emitter`.
    ///
    /// An existing connection of the same receiver to the same event is
    /// replaced, keeping its position. The handler stops being called once
    /// `receiver` is destroyed.
    pub fn try_connect<F>(&mut self, emitter: ObjectId, event: &str, receiver: ObjectId, handler: F) -> Result<()>
    where
        F: FnMut(&mut Runtime, &[Value]) -> HandlerResult + 'static,
    {
        self.ensure_alive(emitter)?;
        self.ensure_alive(receiver)?;
        let key = self.next_connection_key;
        self.next_connection_key += 1;

        let record = self
            .objects
            .get_mut(emitter)
            .ok_or(ObjectError::Destroyed(emitter))?;
        let slot = record
            .events
            .slots
            .get_mut(event)
            .ok_or_else(|| ObjectError::UnknownEvent {
                object: emitter,
                name: event.to_string(),
            })?;
        let handler: Handler = Rc::new(RefCell::new(handler));
        match slot.connections.iter_mut().find(|c| c.receiver == receiver) {
            Some(existing) => {
                existing.key = key;
                existing.handler = handler;
            }
            None => slot.connections.push(Connection {
                key,
                receiver,
                handler,
            }),
        }
        let monitor = slot.monitor.clone();

        if let Some(record) = self.objects.get_mut(receiver) {
            record.subscriptions.insert(emitter);
        }
        if let Some(monitor) = monitor {
            monitor(self, emitter, receiver);
        }
        Ok(())
    }

    /// Remove the connection of `receiver` to `event` of `emitter`.
    ///
    /// Returns whether a connection existed.
    pub fn disconnect(&mut self, emitter: ObjectId, event: &str, receiver: ObjectId) -> Result<bool> {
        let record = self
            .objects
            .get_mut(emitter)
            .ok_or(ObjectError::Destroyed(emitter))?;
        let slot = record
            .events
            .slots
            .get_mut(event)
            .ok_or_else(|| ObjectError::UnknownEvent {
                object: emitter,
                name: event.to_string(),
            })?;
        let before = slot.connections.len();
        slot.connections.retain(|c| c.receiver != receiver);
        let removed = slot.connections.len() != before;
        let still_connected = record.events.connects_to(receiver);

        if removed && !still_connected {
            if let Some(record) = self.objects.get_mut(receiver) {
                record.subscriptions.remove(&emitter);
            }
        }
        Ok(removed)
    }

    pub fn has_connections(&self, emitter: ObjectId, event: &str) -> bool {
        self.objects
            .get(emitter)
            .and_then(|r| r.events.slots.get(event))
            .is_some_and(|s| !s.connections.is_empty())
    }

    /// Call every handler connected to `event` of `emitter`, in connection
    /// order.
    ///
    /// Handler failures are logged and do not stop dispatch. Connections
    /// made during dispatch are not called until the next emission;
    /// connections removed during dispatch are skipped.
    pub fn emit(&mut self, emitter: ObjectId, event: &str, args: &[Value]) -> Result<()> {
        let limit = self.config().emit_depth_limit;
        let record = self
            .objects
            .get_mut(emitter)
            .ok_or(ObjectError::Destroyed(emitter))?;
        let slot = record
            .events
            .slots
            .get_mut(event)
            .ok_or_else(|| ObjectError::UnknownEvent {
                object: emitter,
                name: event.to_string(),
            })?;

        if slot.depth >= limit {
            let message = format!(
                "binding loop detected: '{}' nested {} levels deep, emission dropped",
                event, slot.depth
            );
            self.log(emitter, "events", LogLevel::Warning, &message);
            return Ok(());
        }
        if slot.connections.is_empty() {
            return Ok(());
        }

        slot.depth += 1;
        let snapshot: SmallVec<[(u64, ObjectId, Handler); 4]> = slot
            .connections
            .iter()
            .map(|c| (c.key, c.receiver, Rc::clone(&c.handler)))
            .collect();

        for (key, receiver, handler) in snapshot {
            let connected = self
                .objects
                .get(emitter)
                .is_some_and(|r| r.events.has_key(event, key));
            if !connected || !self.is_alive(receiver) {
                continue;
            }
            let Ok(mut callback) = handler.try_borrow_mut() else {
                let message = format!(
                    "binding loop detected: handler of {} for '{}' is already running",
                    self.describe(receiver),
                    event
                );
                self.log(emitter, "events", LogLevel::Warning, &message);
                continue;
            };
            if let Err(err) = (&mut *callback)(self, args) {
                let message = format!(
                    "handler of {} for '{}' failed: {:#}",
                    self.describe(receiver),
                    event,
                    err
                );
                self.log(emitter, "events", LogLevel::Error, &message);
            }
        }

        if let Some(slot) = self
            .objects
            .get_mut(emitter)
            .and_then(|r| r.events.slots.get_mut(event))
        {
            slot.depth = slot.depth.saturating_sub(1);
        }
        Ok(())
    }

    /// Emit one of the built-in events, which cannot be missing
    pub(crate) fn emit_builtin(&mut self, emitter: ObjectId, event: &str, args: &[Value]) {
        if let Err(err) = self.emit(emitter, event, args) {
            tracing::trace!(?emitter, event, %err, "built-in emission skipped");
        }
    }

    /// Drop every connection `id` takes part in, as emitter or receiver
    pub(crate) fn drop_connections(&mut self, id: ObjectId) {
        let Some(record) = self.objects.get_mut(id) else {
            return;
        };
        let subscriptions = std::mem::take(&mut record.subscriptions);
        let receivers: Vec<ObjectId> = record
            .events
            .slots
            .values_mut()
            .flat_map(|s| s.connections.drain(..).map(|c| c.receiver))
            .collect();

        for emitter in subscriptions {
            if let Some(record) = self.objects.get_mut(emitter) {
                for slot in record.events.slots.values_mut() {
                    slot.connections.retain(|c| c.receiver != id);
                }
            }
        }
        for receiver in receivers {
            if let Some(record) = self.objects.get_mut(receiver) {
                record.subscriptions.remove(&id);
            }
        }
    }

    /// Number of connections made to events of `id`
    pub fn connection_count(&self, id: ObjectId) -> usize {
        self.objects.get(id).map_or(0, |r| r.events.connection_count())
    }

    /// Wrap `callback` so it only runs while `owner` is alive
    pub fn safe_callback<F>(&self, owner: ObjectId, callback: F) -> SafeCallback<F>
    where
        F: FnMut(&mut Runtime, &[Value]),
    {
        SafeCallback { owner, callback }
    }
}
