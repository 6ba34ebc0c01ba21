//! Object runtime
//!
//! The [`Runtime`] owns every managed object record in a generational arena
//! together with the scheduling state shared between them: the deferred
//! update queue, timers and named task queues. Objects are addressed by
//! [`ObjectId`] handles; a handle outliving its object never aliases a new
//! one.
//!
//! The runtime is single-threaded. Event handlers, deferred callbacks and
//! completion continuations all receive `&mut Runtime` and run to completion
//! before the next one starts; progress over time is driven by
//! [`Runtime::tick`].

use std::rc::Rc;

use slotmap::SlotMap;

use crate::clock::{Clock, SystemClock};
use crate::config::RuntimeConfig;
use crate::defer::{DeferredQueue, TimerQueue};
use crate::log::{LogLevel, LogSink, TracingSink};
use crate::object::{ObjectId, ObjectRecord};
use crate::queue::TaskQueues;

/// Arena and scheduler for managed objects
pub struct Runtime {
    pub(crate) objects: SlotMap<ObjectId, ObjectRecord>,
    pub(crate) deferred: DeferredQueue,
    pub(crate) timers: TimerQueue,
    pub(crate) queues: TaskQueues,
    pub(crate) next_connection_key: u64,
    clock: Rc<dyn Clock>,
    sink: Rc<dyn LogSink>,
    config: RuntimeConfig,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    /// Create a runtime with the default configuration, the wall clock and
    /// `tracing` output
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            objects: SlotMap::with_key(),
            deferred: DeferredQueue::default(),
            timers: TimerQueue::default(),
            queues: TaskQueues::default(),
            next_connection_key: 0,
            clock: Rc::new(SystemClock),
            sink: Rc::new(TracingSink),
            config,
        }
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Rc::new(clock);
        self
    }

    /// Replace the fallback log sink
    pub fn with_sink(mut self, sink: impl LogSink + 'static) -> Self {
        self.sink = Rc::new(sink);
        self
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Current time of the runtime clock in milliseconds
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Route log output of `id` and its descendants to `sink`.
    ///
    /// `None` restores the default lookup through the parent chain.
    pub fn set_log_sink(&mut self, id: ObjectId, sink: Option<Rc<dyn LogSink>>) {
        if let Some(record) = self.objects.get_mut(id) {
            record.sink = sink;
        }
    }

    /// Log on behalf of an object.
    ///
    /// Uses the sink of the nearest object in the parent chain that has one,
    /// falling back to the runtime sink.
    pub fn log(&self, id: ObjectId, domain: &str, level: LogLevel, message: &str) {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let Some(record) = self.objects.get(current) else {
                break;
            };
            if let Some(sink) = &record.sink {
                sink.log(domain, level, message);
                return;
            }
            cursor = record.parent;
        }
        self.sink.log(domain, level, message);
    }

    /// Number of objects that have not terminated yet
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }
}
