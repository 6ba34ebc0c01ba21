//! Deferred updates and timers
//!
//! Work deferred with [`Runtime::defer`] runs once at the next
//! [`Runtime::tick`]. Keyed calls coalesce: deferring the same
//! `(owner, key)` again before the tick replaces the pending closure but
//! keeps its place in the queue. Timers created with [`Runtime::wait`] fire
//! on the first tick at or after their deadline.

use std::collections::{BTreeMap, VecDeque};

use crate::completion::{Completion, Resolver};
use crate::object::ObjectId;
use crate::runtime::Runtime;

type DeferredFn = Box<dyn FnOnce(&mut Runtime)>;

struct Deferred {
    owner: ObjectId,
    key: Option<String>,
    callback: DeferredFn,
}

/// Pending deferred calls.
///
/// `next` collects calls for the coming tick; `current` is the batch being
/// flushed, so work deferred during a flush waits for the following tick.
#[derive(Default)]
pub(crate) struct DeferredQueue {
    current: VecDeque<Deferred>,
    next: VecDeque<Deferred>,
}

impl DeferredQueue {
    fn push(&mut self, owner: ObjectId, key: Option<&str>, callback: DeferredFn) {
        if let Some(key) = key {
            let pending = self
                .next
                .iter_mut()
                .find(|d| d.owner == owner && d.key.as_deref() == Some(key));
            if let Some(pending) = pending {
                pending.callback = callback;
                return;
            }
        }
        self.next.push_back(Deferred {
            owner,
            key: key.map(str::to_string),
            callback,
        });
    }

    fn matches(d: &Deferred, owner: ObjectId, key: &str) -> bool {
        d.owner == owner && d.key.as_deref() == Some(key)
    }

    fn cancel(&mut self, owner: ObjectId, key: &str) -> bool {
        let before = self.current.len() + self.next.len();
        self.current.retain(|d| !Self::matches(d, owner, key));
        self.next.retain(|d| !Self::matches(d, owner, key));
        before != self.current.len() + self.next.len()
    }

    fn is_pending(&self, owner: ObjectId, key: &str) -> bool {
        self.current
            .iter()
            .chain(self.next.iter())
            .any(|d| Self::matches(d, owner, key))
    }

    pub(crate) fn cancel_owner(&mut self, owner: ObjectId) {
        self.current.retain(|d| d.owner != owner);
        self.next.retain(|d| d.owner != owner);
    }

    pub(crate) fn len(&self) -> usize {
        self.current.len() + self.next.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.current.is_empty() && self.next.is_empty()
    }
}

struct Timer {
    owner: ObjectId,
    name: Option<String>,
    resolver: Resolver<bool>,
}

/// Timers ordered by `(deadline, sequence)`
#[derive(Default)]
pub(crate) struct TimerQueue {
    timers: BTreeMap<(u64, u64), Timer>,
    sequence: u64,
}

impl TimerQueue {
    fn take_named(&mut self, owner: ObjectId, name: &str) -> Option<Timer> {
        let key = self
            .timers
            .iter()
            .find(|(_, t)| t.owner == owner && t.name.as_deref() == Some(name))
            .map(|(k, _)| *k)?;
        self.timers.remove(&key)
    }

    fn take_expired(&mut self, now: u64) -> Vec<Timer> {
        let later = self.timers.split_off(&(now.saturating_add(1), 0));
        std::mem::replace(&mut self.timers, later)
            .into_values()
            .collect()
    }

    pub(crate) fn cancel_owner(&mut self, owner: ObjectId) {
        self.timers.retain(|_, t| t.owner != owner);
    }

    pub(crate) fn len(&self) -> usize {
        self.timers.len()
    }

    pub(crate) fn next_deadline(&self) -> Option<u64> {
        self.timers.keys().next().map(|(deadline, _)| *deadline)
    }
}

impl Runtime {
    /// Run `callback` at the next tick unless `owner` is destroyed first.
    ///
    /// With a `key`, replaces a not yet started call of the same owner and
    /// key in place.
    pub fn defer<F>(&mut self, owner: ObjectId, key: Option<&str>, callback: F)
    where
        F: FnOnce(&mut Runtime) + 'static,
    {
        tracing::trace!(?owner, key, "deferred");
        self.deferred.push(owner, key, Box::new(callback));
    }

    /// Drop the pending call `(owner, key)`; returns whether one existed
    pub fn cancel_deferred(&mut self, owner: ObjectId, key: &str) -> bool {
        self.deferred.cancel(owner, key)
    }

    pub fn is_deferred_pending(&self, owner: ObjectId, key: &str) -> bool {
        self.deferred.is_pending(owner, key)
    }

    /// Number of deferred calls waiting to run
    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    /// A completion resolving `true` once `ms` milliseconds have passed on
    /// the runtime clock.
    ///
    /// A named wait can be aborted with [`Runtime::abort_wait`]; starting a
    /// new wait under the same name aborts the previous one.
    pub fn wait(&mut self, owner: ObjectId, ms: u64, name: Option<&str>) -> Completion<bool> {
        if let Some(name) = name {
            self.abort_wait(owner, name);
        }
        let (completion, resolver) = Completion::pending();
        let deadline = self.now_ms().saturating_add(ms);
        let sequence = self.timers.sequence;
        self.timers.sequence += 1;
        self.timers.timers.insert(
            (deadline, sequence),
            Timer {
                owner,
                name: name.map(str::to_string),
                resolver,
            },
        );
        completion
    }

    /// Resolve the named wait of `owner` with `false` right away
    pub fn abort_wait(&mut self, owner: ObjectId, name: &str) -> bool {
        match self.timers.take_named(owner, name) {
            Some(timer) => {
                timer.resolver.resolve(self, false);
                true
            }
            None => false,
        }
    }

    /// Number of timers that have not fired
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Deadline of the earliest pending timer
    pub fn next_timer_deadline(&self) -> Option<u64> {
        self.timers.next_deadline()
    }

    /// Fire expired timers in deadline order, then flush the deferred batch.
    ///
    /// Returns the number of timers and callbacks that ran.
    pub fn tick(&mut self) -> usize {
        let mut ran = 0;

        let now = self.now_ms();
        for timer in self.timers.take_expired(now) {
            if self.is_alive(timer.owner) {
                timer.resolver.resolve(self, true);
                ran += 1;
            }
        }

        let batch = std::mem::take(&mut self.deferred.next);
        self.deferred.current.extend(batch);
        while let Some(entry) = self.deferred.current.pop_front() {
            if !self.is_alive(entry.owner) {
                tracing::trace!(owner = ?entry.owner, "deferred call of dead owner dropped");
                continue;
            }
            (entry.callback)(self);
            ran += 1;
        }
        ran
    }

    /// Tick until nothing is deferred and no timer has expired, at most
    /// `idle_tick_limit` times. Returns the total work done.
    pub fn run_until_idle(&mut self) -> usize {
        let mut ran = 0;
        for _ in 0..self.config().idle_tick_limit {
            let now = self.now_ms();
            let timer_due = self.timers.next_deadline().is_some_and(|d| d <= now);
            if self.deferred.is_empty() && !timer_due {
                break;
            }
            ran += self.tick();
        }
        ran
    }
}
