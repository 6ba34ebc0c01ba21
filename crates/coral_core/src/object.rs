//! Managed objects and the ownership graph
//!
//! Each object has at most one owning parent and an ordered list of
//! children. Destroying a parent destroys its children first. Besides
//! ownership, objects can hold non-owning references to each other; holders
//! are notified with `referenceGone` when the target dies, but are never
//! destroyed by it.

use std::any::Any;
use std::rc::Rc;

use rustc_hash::FxHashSet;
use slotmap::new_key_type;
use smallvec::SmallVec;

use crate::error::{ObjectError, Result};
use crate::events::{event_names, EventBus};
use crate::lifecycle::{Lifecycle, LifecycleEvent, LifecycleMachine};
use crate::log::{LogLevel, LogSink};
use crate::property::PropertyRegistry;
use crate::runtime::Runtime;
use crate::value::Value;

new_key_type! {
    /// Handle of a managed object
    pub struct ObjectId;
}

type TerminationHook = Box<dyn FnOnce(&mut Runtime, ObjectId)>;

/// Multiset of object handles kept in first-insertion order
pub(crate) type RefCounts = SmallVec<[(ObjectId, usize); 2]>;

pub(crate) struct ObjectRecord {
    pub(crate) type_name: String,
    pub(crate) location: String,
    pub(crate) lifecycle: LifecycleMachine,
    pub(crate) parent: Option<ObjectId>,
    pub(crate) children: SmallVec<[ObjectId; 4]>,
    /// Objects holding a reference to this one
    pub(crate) holders: RefCounts,
    /// Objects this one holds a reference to
    pub(crate) holding: RefCounts,
    pub(crate) auto_release: bool,
    pub(crate) properties: PropertyRegistry,
    pub(crate) events: EventBus,
    /// Emitters this object has connections on
    pub(crate) subscriptions: FxHashSet<ObjectId>,
    pub(crate) termination_hooks: Vec<TerminationHook>,
    pub(crate) sink: Option<Rc<dyn LogSink>>,
    pub(crate) component: Option<Box<dyn Any>>,
}

impl ObjectRecord {
    fn new(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            location: String::new(),
            lifecycle: LifecycleMachine::new(),
            parent: None,
            children: SmallVec::new(),
            holders: SmallVec::new(),
            holding: SmallVec::new(),
            auto_release: false,
            properties: PropertyRegistry::default(),
            events: EventBus::with_builtins(),
            subscriptions: FxHashSet::default(),
            termination_hooks: Vec::new(),
            sink: None,
            component: None,
        }
    }
}

fn count_up(counts: &mut RefCounts, id: ObjectId) {
    match counts.iter_mut().find(|(other, _)| *other == id) {
        Some((_, n)) => *n += 1,
        None => counts.push((id, 1)),
    }
}

fn count_down(counts: &mut RefCounts, id: ObjectId) -> bool {
    let Some(pos) = counts.iter().position(|(other, _)| *other == id) else {
        return false;
    };
    counts[pos].1 -= 1;
    if counts[pos].1 == 0 {
        counts.remove(pos);
    }
    true
}

fn count_clear(counts: &mut RefCounts, id: ObjectId) {
    counts.retain(|(other, _)| *other != id);
}

impl Runtime {
    /// Create a new object in the `Created` state
    pub fn create(&mut self, type_name: &str) -> ObjectId {
        let id = self.objects.insert(ObjectRecord::new(type_name));
        tracing::trace!(?id, type_name, "object created");
        id
    }

    /// Create an object carrying typed component state
    pub fn create_component<T: Any>(&mut self, type_name: &str, state: T) -> ObjectId {
        let id = self.create(type_name);
        if let Some(record) = self.objects.get_mut(id) {
            record.component = Some(Box::new(state));
        }
        id
    }

    pub fn component<T: Any>(&self, id: ObjectId) -> Option<&T> {
        self.objects
            .get(id)?
            .component
            .as_ref()?
            .downcast_ref::<T>()
    }

    pub fn component_mut<T: Any>(&mut self, id: ObjectId) -> Option<&mut T> {
        self.objects
            .get_mut(id)?
            .component
            .as_mut()?
            .downcast_mut::<T>()
    }

    /// Whether `id` carries component state of type `T`
    pub fn has_component<T: Any>(&self, id: ObjectId) -> bool {
        self.component::<T>(id).is_some()
    }

    /// Attach a source location, used in diagnostics
    pub fn set_location(&mut self, id: ObjectId, location: impl Into<String>) {
        if let Some(record) = self.objects.get_mut(id) {
            record.location = location.into();
        }
    }

    pub fn location(&self, id: ObjectId) -> Option<&str> {
        self.objects.get(id).map(|r| r.location.as_str())
    }

    pub fn type_name(&self, id: ObjectId) -> Option<&str> {
        self.objects.get(id).map(|r| r.type_name.as_str())
    }

    /// Human readable description such as `ListModel@main.shui:12`
    pub fn describe(&self, id: ObjectId) -> String {
        match self.objects.get(id) {
            Some(r) if r.location.is_empty() => format!("{}{:?}", r.type_name, id),
            Some(r) => format!("{}@{}", r.type_name, r.location),
            None => format!("<terminated {:?}>", id),
        }
    }

    /// Lifecycle state; `Terminated` for handles no longer in the arena
    pub fn lifecycle(&self, id: ObjectId) -> Lifecycle {
        self.objects
            .get(id)
            .map_or(Lifecycle::Terminated, |r| r.lifecycle.current())
    }

    /// Alive means neither destroyed nor terminated
    pub fn is_alive(&self, id: ObjectId) -> bool {
        self.lifecycle(id).is_alive()
    }

    pub(crate) fn ensure_alive(&self, id: ObjectId) -> Result<()> {
        if self.is_alive(id) {
            Ok(())
        } else {
            Err(ObjectError::Destroyed(id))
        }
    }

    pub(crate) fn send_lifecycle(&mut self, id: ObjectId, event: LifecycleEvent) -> Option<Lifecycle> {
        let state = self.objects.get_mut(id)?.lifecycle.send(event);
        if let Some(state) = state {
            tracing::trace!(?id, state = state.as_str(), "lifecycle");
        }
        state
    }

    /// Run initialization: `Created -> Initialized`, emit `initialization`,
    /// `-> Running`, then initialize children and referenced objects that
    /// are still `Created`.
    pub fn init(&mut self, id: ObjectId) -> Result<()> {
        if !self.objects.contains_key(id) {
            return Err(ObjectError::Destroyed(id));
        }
        if self.send_lifecycle(id, LifecycleEvent::Initialize).is_none() {
            let message = format!(
                "{} initialized twice (currently {})",
                self.describe(id),
                self.lifecycle(id).as_str()
            );
            self.log(id, "object", LogLevel::Error, &message);
            return Ok(());
        }
        self.emit_builtin(id, event_names::INITIALIZATION, &[]);
        if self.send_lifecycle(id, LifecycleEvent::Run).is_none() {
            // torn down from inside an initialization handler
            return Ok(());
        }

        for child in self.children(id) {
            if self.lifecycle(child) == Lifecycle::Created {
                self.init(child)?;
            }
        }
        let held: Vec<ObjectId> = self
            .objects
            .get(id)
            .map(|r| r.holding.iter().map(|(target, _)| *target).collect())
            .unwrap_or_default();
        for target in held {
            if self.lifecycle(target) == Lifecycle::Created {
                self.init(target)?;
            }
        }
        Ok(())
    }

    /// Move `child` under `parent`, or detach it with `None`.
    ///
    /// Fails with `Cycle` if `parent` is `child` itself or one of its
    /// descendants, and with `Destroyed` if `parent` is being torn down.
    /// Nothing changes on failure.
    pub fn set_parent(&mut self, child: ObjectId, parent: Option<ObjectId>) -> Result<()> {
        self.ensure_alive(child)?;
        if let Some(parent) = parent {
            if self.lifecycle(parent) >= Lifecycle::Stopping {
                return Err(ObjectError::Destroyed(parent));
            }
            if parent == child || self.is_ancestor_of(child, parent) {
                return Err(ObjectError::Cycle { child, parent });
            }
        }

        let previous = self.objects.get(child).and_then(|r| r.parent);
        if previous == parent {
            return Ok(());
        }

        if let Some(old) = previous {
            if let Some(record) = self.objects.get_mut(old) {
                record.children.retain(|c| *c != child);
            }
        }
        if let Some(record) = self.objects.get_mut(child) {
            record.parent = parent;
        }
        if let Some(new) = parent {
            if let Some(record) = self.objects.get_mut(new) {
                record.children.push(child);
            }
        }

        if let Some(old) = previous {
            if self.lifecycle(old) < Lifecycle::Stopping {
                self.emit_builtin(old, event_names::CHILDREN_CHANGED, &[]);
            }
        }
        if let Some(new) = parent {
            self.emit_builtin(new, event_names::CHILDREN_CHANGED, &[]);
        }
        self.emit_builtin(child, event_names::PARENT_CHANGED, &[parent.into()]);

        match parent {
            Some(new) => {
                if self.lifecycle(new) == Lifecycle::Running
                    && self.lifecycle(child) == Lifecycle::Created
                {
                    self.defer(child, Some("init"), move |rt| {
                        if rt.lifecycle(child) == Lifecycle::Created {
                            let _ = rt.init(child);
                        }
                    });
                }
            }
            None => self.schedule_release_check(child),
        }
        Ok(())
    }

    /// Ownership-aware add: make `parent` the owner of `child`
    pub fn add(&mut self, parent: ObjectId, child: ObjectId) -> Result<()> {
        self.set_parent(child, Some(parent))
    }

    pub fn parent(&self, id: ObjectId) -> Option<ObjectId> {
        self.objects.get(id)?.parent
    }

    /// Children in insertion order
    pub fn children(&self, id: ObjectId) -> Vec<ObjectId> {
        self.objects
            .get(id)
            .map(|r| r.children.to_vec())
            .unwrap_or_default()
    }

    /// Whether `ancestor` is a strict ancestor of `id`
    pub fn is_ancestor_of(&self, ancestor: ObjectId, id: ObjectId) -> bool {
        let mut cursor = self.parent(id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    /// Pre-order walk of the subtree rooted at `root`.
    ///
    /// Returning `false` from `f` skips the children of that node.
    pub fn visit<F>(&self, root: ObjectId, mut f: F)
    where
        F: FnMut(ObjectId) -> bool,
    {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(record) = self.objects.get(id) else {
                continue;
            };
            if f(id) {
                stack.extend(record.children.iter().rev().copied());
            }
        }
    }

    /// Record that `holder` keeps a non-owning reference to `target`
    pub fn reference_add(&mut self, target: ObjectId, holder: ObjectId) -> Result<()> {
        if target == holder {
            return Ok(());
        }
        self.ensure_alive(target)?;
        self.ensure_alive(holder)?;
        if let Some(record) = self.objects.get_mut(target) {
            count_up(&mut record.holders, holder);
        }
        if let Some(record) = self.objects.get_mut(holder) {
            count_up(&mut record.holding, target);
        }
        // held by a running object: init on the next tick
        if self.lifecycle(holder) == Lifecycle::Running
            && self.lifecycle(target) == Lifecycle::Created
        {
            self.defer(target, Some("init"), move |rt| {
                if rt.lifecycle(target) == Lifecycle::Created {
                    let _ = rt.init(target);
                }
            });
        }
        Ok(())
    }

    /// Drop one reference of `holder` to `target`
    pub fn reference_remove(&mut self, target: ObjectId, holder: ObjectId) -> Result<()> {
        if target == holder {
            return Ok(());
        }
        let removed = match self.objects.get_mut(target) {
            Some(record) => count_down(&mut record.holders, holder),
            None => return Err(ObjectError::Destroyed(target)),
        };
        if let Some(record) = self.objects.get_mut(holder) {
            count_down(&mut record.holding, target);
        }
        if removed {
            self.schedule_release_check(target);
        }
        Ok(())
    }

    /// Total number of references held on `target`
    pub fn reference_count(&self, target: ObjectId) -> usize {
        self.objects
            .get(target)
            .map_or(0, |r| r.holders.iter().map(|(_, n)| n).sum())
    }

    /// Distinct holders of `target`
    pub fn reference_holders(&self, target: ObjectId) -> Vec<ObjectId> {
        self.objects
            .get(target)
            .map(|r| r.holders.iter().map(|(h, _)| *h).collect())
            .unwrap_or_default()
    }

    /// Destroy `id` once it is neither owned nor referenced
    pub fn set_auto_release(&mut self, id: ObjectId, enabled: bool) {
        if let Some(record) = self.objects.get_mut(id) {
            record.auto_release = enabled;
        }
        self.schedule_release_check(id);
    }

    /// At the next tick, detach `id` from its parent and destroy it unless
    /// something still references it; referenced objects become
    /// auto-released instead.
    pub fn release_later(&mut self, id: ObjectId) {
        self.defer(id, Some("releaseLater"), move |rt| {
            let _ = rt.set_parent(id, None);
            if rt.reference_count(id) == 0 {
                let _ = rt.destroy(id);
            } else if let Some(record) = rt.objects.get_mut(id) {
                record.auto_release = true;
            }
        });
    }

    fn should_release(&self, id: ObjectId) -> bool {
        self.objects.get(id).is_some_and(|r| {
            r.auto_release
                && r.parent.is_none()
                && r.holders.is_empty()
                && r.lifecycle.current() < Lifecycle::Stopping
        })
    }

    pub(crate) fn schedule_release_check(&mut self, id: ObjectId) {
        if !self.should_release(id) {
            return;
        }
        self.defer(id, Some("release"), move |rt| {
            if rt.should_release(id) {
                tracing::trace!(?id, "auto-release");
                let _ = rt.destroy(id);
            }
        });
    }

    /// Register a hook run when `id` reaches `Destroyed`, after its children
    /// are gone. Hooks run in registration order.
    pub fn on_terminate<F>(&mut self, id: ObjectId, hook: F) -> Result<()>
    where
        F: FnOnce(&mut Runtime, ObjectId) + 'static,
    {
        self.ensure_alive(id)?;
        if let Some(record) = self.objects.get_mut(id) {
            record.termination_hooks.push(Box::new(hook));
        }
        Ok(())
    }

    /// Tear `id` down.
    ///
    /// Order: `Stopping` + `destruction`, children depth-first in child
    /// order, `Destroyed` + termination hooks + `termination`, holders get
    /// `referenceGone`, then connections, deferred calls, timers, queued
    /// tasks and the parent link are dropped and the record is removed.
    pub fn destroy(&mut self, id: ObjectId) -> Result<()> {
        if !self.objects.contains_key(id) {
            return Err(ObjectError::Destroyed(id));
        }
        if self.send_lifecycle(id, LifecycleEvent::Stop).is_none() {
            let message = format!(
                "{} destroyed while already {}",
                self.describe(id),
                self.lifecycle(id).as_str()
            );
            self.log(id, "object", LogLevel::Error, &message);
            return Ok(());
        }
        self.emit_builtin(id, event_names::DESTRUCTION, &[]);

        for child in self.children(id) {
            if self.parent(child) == Some(id) && self.lifecycle(child) < Lifecycle::Stopping {
                self.destroy(child)?;
            }
        }

        self.send_lifecycle(id, LifecycleEvent::Destroy);
        let hooks = self
            .objects
            .get_mut(id)
            .map(|r| std::mem::take(&mut r.termination_hooks))
            .unwrap_or_default();
        for hook in hooks {
            hook(self, id);
        }
        self.emit_builtin(id, event_names::TERMINATION, &[]);

        let holders = self
            .objects
            .get_mut(id)
            .map(|r| std::mem::take(&mut r.holders))
            .unwrap_or_default();
        for (holder, _) in holders {
            if let Some(record) = self.objects.get_mut(holder) {
                count_clear(&mut record.holding, id);
            }
            if self.is_alive(holder) {
                self.emit_builtin(holder, event_names::REFERENCE_GONE, &[Value::Object(id)]);
            }
        }

        let holding = self
            .objects
            .get_mut(id)
            .map(|r| std::mem::take(&mut r.holding))
            .unwrap_or_default();
        for (target, _) in holding {
            if let Some(record) = self.objects.get_mut(target) {
                count_clear(&mut record.holders, id);
            }
            self.schedule_release_check(target);
        }

        self.drop_connections(id);
        self.deferred.cancel_owner(id);
        self.timers.cancel_owner(id);
        self.queues.clear_owner(id);

        let parent = self.objects.get_mut(id).and_then(|r| r.parent.take());
        if let Some(parent) = parent {
            if let Some(record) = self.objects.get_mut(parent) {
                record.children.retain(|c| *c != id);
            }
            if self.lifecycle(parent) < Lifecycle::Stopping {
                self.emit_builtin(parent, event_names::CHILDREN_CHANGED, &[]);
            }
        }

        self.send_lifecycle(id, LifecycleEvent::Terminate);
        self.objects.remove(id);
        Ok(())
    }
}
