//! Sequential action
//!
//! Runs its enabled child actions one after another in child order. With
//! `repeat`, starts over on the next tick for as long as it stays enabled and
//! running.

use std::rc::Rc;

use coral_core::{ObjectId, Result, Runtime};

use crate::action::{add_child, declare_repeat, Action, AsAction, Body, Group};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SequentialAction(Action);

impl AsAction for SequentialAction {
    fn action(&self) -> Action {
        self.0
    }
}

impl From<SequentialAction> for ObjectId {
    fn from(action: SequentialAction) -> Self {
        action.0.id()
    }
}

impl SequentialAction {
    pub const TYPE_NAME: &'static str = "SequentialAction";

    pub fn new(rt: &mut Runtime) -> Result<Self> {
        let action = Action::create(rt, Self::TYPE_NAME, Body::Sequential(Group::default()))?;
        declare_repeat(rt, action.id())?;
        Ok(Self(action))
    }

    /// Append `child`; anything that is not an action is logged and ignored
    pub fn add(&self, rt: &mut Runtime, child: impl Into<ObjectId>) {
        add_child(rt, self.0, child.into());
    }

    pub fn set_repeat(&self, rt: &mut Runtime, repeat: bool) -> Result<()> {
        rt.set_property(self.0.id(), "repeat", repeat)
    }

    /// Child currently being awaited
    pub fn current(&self, rt: &Runtime) -> Option<ObjectId> {
        self.0.group(rt).and_then(|g| g.current)
    }
}

pub(crate) fn run(rt: &mut Runtime, seq: Action, run: u64) {
    let steps: Rc<[Action]> = seq
        .child_actions(rt)
        .into_iter()
        .filter(|child| child.is_enabled(rt))
        .collect();
    step(rt, seq, run, steps, 0);
}

/// Run children from `index` on. Children that finish synchronously are
/// handled in the loop; only a pending child suspends the sequence.
fn step(rt: &mut Runtime, seq: Action, run: u64, steps: Rc<[Action]>, mut index: usize) {
    loop {
        if !seq.is_running(rt, run) {
            seq.finish(rt, run);
            return;
        }

        let Some(&child) = steps.get(index) else {
            cycle_done(rt, seq, run);
            return;
        };
        index += 1;
        // skip children that were destroyed or moved away since the cycle began
        if rt.parent(child.id()) != Some(seq.id()) {
            continue;
        }

        if let Some(group) = seq.group_mut(rt) {
            group.current = Some(child.id());
        }
        let done = child.start(rt);
        if done.is_resolved() {
            clear_current(rt, seq, child);
            continue;
        }
        let steps = steps.clone();
        done.then(rt, move |rt, ()| {
            clear_current(rt, seq, child);
            step(rt, seq, run, steps, index);
        });
        return;
    }
}

fn clear_current(rt: &mut Runtime, seq: Action, child: Action) {
    if let Some(group) = seq.group_mut(rt) {
        if group.current == Some(child.id()) {
            group.current = None;
        }
    }
}

fn cycle_done(rt: &mut Runtime, seq: Action, run: u64) {
    let repeat = seq.group(rt).is_some_and(|g| g.repeat);
    if !repeat {
        seq.finish(rt, run);
        return;
    }
    rt.defer(seq.id(), Some("repeat"), move |rt| {
        if seq.is_running(rt, run) {
            self::run(rt, seq, run);
        } else {
            seq.finish(rt, run);
        }
    });
}

pub(crate) fn stop(rt: &mut Runtime, seq: Action, run: u64) {
    let current = seq
        .group(rt)
        .and_then(|g| g.current)
        .and_then(|id| Action::from_id(rt, id))
        .filter(|child| child.is_busy(rt));
    match current {
        // finishing the child resumes the sequence, which then sees it is stopping
        Some(child) => {
            child.stop(rt);
        }
        None => {
            rt.cancel_deferred(seq.id(), "repeat");
            seq.finish(rt, run);
        }
    }
}
