//! Named task queues
//!
//! A task queue serializes asynchronous work of one object: whoever calls
//! [`Runtime::wait_queued`] receives a [`QueueTicket`] once every earlier
//! ticket of the same queue has been released.

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::completion::{Completion, Resolver};
use crate::object::ObjectId;
use crate::runtime::Runtime;

#[derive(Default)]
struct TaskQueue {
    busy: bool,
    waiting: VecDeque<Resolver<QueueTicket>>,
}

#[derive(Default)]
pub(crate) struct TaskQueues {
    queues: FxHashMap<(ObjectId, String), TaskQueue>,
}

impl TaskQueues {
    pub(crate) fn clear_owner(&mut self, owner: ObjectId) {
        self.queues.retain(|(o, _), _| *o != owner);
    }

    fn waiting(&self, owner: ObjectId, name: &str) -> usize {
        self.queues
            .get(&(owner, name.to_string()))
            .map_or(0, |q| q.waiting.len())
    }
}

/// Permission to run the next task of a queue.
///
/// Releasing hands the queue to the next waiter. Releasing twice is
/// harmless.
#[derive(Clone, Debug)]
pub struct QueueTicket {
    owner: ObjectId,
    queue: String,
    released: Rc<Cell<bool>>,
}

impl QueueTicket {
    fn new(owner: ObjectId, queue: &str) -> Self {
        Self {
            owner,
            queue: queue.to_string(),
            released: Rc::new(Cell::new(false)),
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn is_released(&self) -> bool {
        self.released.get()
    }

    pub fn release(&self, rt: &mut Runtime) {
        if self.released.replace(true) {
            return;
        }
        rt.advance_queue(self.owner, &self.queue);
    }
}

impl Runtime {
    /// Wait for a turn in queue `name` of `owner`
    pub fn wait_queued(&mut self, owner: ObjectId, name: &str) -> Completion<QueueTicket> {
        let queue = self
            .queues
            .queues
            .entry((owner, name.to_string()))
            .or_default();
        if !queue.busy {
            queue.busy = true;
            return Completion::resolved(QueueTicket::new(owner, name));
        }
        let (completion, resolver) = Completion::pending();
        queue.waiting.push_back(resolver);
        completion
    }

    /// Drop every waiter of queue `name`; their completions never resolve
    pub fn clear_queue(&mut self, owner: ObjectId, name: &str) {
        self.queues.queues.remove(&(owner, name.to_string()));
    }

    /// Number of waiters behind the current ticket holder
    pub fn queued_len(&self, owner: ObjectId, name: &str) -> usize {
        self.queues.waiting(owner, name)
    }

    fn advance_queue(&mut self, owner: ObjectId, name: &str) {
        let key = (owner, name.to_string());
        let next = match self.queues.queues.get_mut(&key) {
            Some(queue) => queue.waiting.pop_front(),
            None => return,
        };
        match next {
            Some(resolver) if self.is_alive(owner) => {
                resolver.resolve(self, QueueTicket::new(owner, name));
            }
            _ => {
                self.queues.queues.remove(&key);
            }
        }
    }
}
