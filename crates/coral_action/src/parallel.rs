//! Parallel action
//!
//! Starts every child action at once and finishes when the last one does.
//! Without children it finishes as soon as it starts.

use coral_core::{ObjectId, Result, Runtime};

use crate::action::{add_child, declare_repeat, Action, AsAction, Body, Group};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ParallelAction(Action);

impl AsAction for ParallelAction {
    fn action(&self) -> Action {
        self.0
    }
}

impl From<ParallelAction> for ObjectId {
    fn from(action: ParallelAction) -> Self {
        action.0.id()
    }
}

impl ParallelAction {
    pub const TYPE_NAME: &'static str = "ParallelAction";

    pub fn new(rt: &mut Runtime) -> Result<Self> {
        let action = Action::create(rt, Self::TYPE_NAME, Body::Parallel(Group::default()))?;
        declare_repeat(rt, action.id())?;
        Ok(Self(action))
    }

    /// Add `child`; anything that is not an action is logged and ignored
    pub fn add(&self, rt: &mut Runtime, child: impl Into<ObjectId>) {
        add_child(rt, self.0, child.into());
    }

    pub fn set_repeat(&self, rt: &mut Runtime, repeat: bool) -> Result<()> {
        rt.set_property(self.0.id(), "repeat", repeat)
    }

    /// Children of the current cycle still running
    pub fn remaining(&self, rt: &Runtime) -> usize {
        self.0.group(rt).map_or(0, |g| g.remaining)
    }
}

pub(crate) fn run(rt: &mut Runtime, par: Action, run: u64) {
    if !par.is_running(rt, run) {
        par.finish(rt, run);
        return;
    }
    let children = par.child_actions(rt);
    if children.is_empty() {
        cycle_done(rt, par, run);
        return;
    }

    if let Some(group) = par.group_mut(rt) {
        group.remaining = children.len();
    }
    for child in children {
        child.start(rt).then(rt, move |rt, ()| {
            let remaining = match par.state_mut(rt) {
                Some(state) if state.run == run => match &mut state.body {
                    Body::Parallel(group) => {
                        group.remaining = group.remaining.saturating_sub(1);
                        group.remaining
                    }
                    _ => return,
                },
                _ => return,
            };
            if remaining == 0 {
                cycle_done(rt, par, run);
            }
        });
    }
}

fn cycle_done(rt: &mut Runtime, par: Action, run: u64) {
    let repeat = par.group(rt).is_some_and(|g| g.repeat);
    if repeat && par.is_running(rt, run) {
        rt.defer(par.id(), Some("repeat"), move |rt| self::run(rt, par, run));
    } else {
        par.finish(rt, run);
    }
}

pub(crate) fn stop(rt: &mut Runtime, par: Action, run: u64) {
    let busy: Vec<Action> = par
        .child_actions(rt)
        .into_iter()
        .filter(|child| child.is_busy(rt))
        .collect();
    let waiting = par.group(rt).map_or(0, |g| g.remaining);
    if busy.is_empty() || waiting == 0 {
        rt.cancel_deferred(par.id(), "repeat");
        par.finish(rt, run);
        return;
    }
    // the last child to finish completes the stop
    for child in busy {
        child.stop(rt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wait::WaitAction;
    use coral_core::ManualClock;

    #[test]
    fn test_without_children_finishes_at_once() {
        let mut rt = Runtime::new();
        let par = ParallelAction::new(&mut rt).unwrap();
        let observer = rt.create("Observer");
        let finishes = std::rc::Rc::new(std::cell::Cell::new(0));
        let f = finishes.clone();
        rt.connect(par.id(), crate::action_events::FINISH, observer, move |_, _| {
            f.set(f.get() + 1)
        })
        .unwrap();

        let done = par.action().start(&mut rt);
        assert_eq!(finishes.get(), 1);
        assert!(done.is_resolved());
        assert!(!par.action().is_busy(&rt));
    }

    #[test]
    fn test_finishes_with_the_slowest_child() {
        let clock = ManualClock::new(0);
        let mut rt = Runtime::new().with_clock(clock.clone());
        let par = ParallelAction::new(&mut rt).unwrap();
        let short = WaitAction::new(&mut rt).unwrap();
        short.set_duration(&mut rt, 10);
        let long = WaitAction::new(&mut rt).unwrap();
        long.set_duration(&mut rt, 50);
        par.add(&mut rt, short);
        par.add(&mut rt, long);

        let done = par.action().start(&mut rt);
        assert!(short.action().is_busy(&rt));
        assert!(long.action().is_busy(&rt));
        assert_eq!(par.remaining(&rt), 2);

        clock.advance(10);
        rt.run_until_idle();
        assert_eq!(par.remaining(&rt), 1);
        assert!(!done.is_resolved());

        clock.advance(40);
        rt.run_until_idle();
        assert!(done.is_resolved());
    }

    #[test]
    fn test_stop_stops_every_child() {
        let clock = ManualClock::new(0);
        let mut rt = Runtime::new().with_clock(clock.clone());
        let par = ParallelAction::new(&mut rt).unwrap();
        let children: Vec<WaitAction> = (0..3)
            .map(|_| {
                let wait = WaitAction::new(&mut rt).unwrap();
                wait.set_duration(&mut rt, 1_000);
                par.add(&mut rt, wait);
                wait
            })
            .collect();

        let done = par.action().start(&mut rt);
        assert!(par.action().stop(&mut rt).is_resolved());
        assert!(done.is_resolved());
        assert!(children.iter().all(|c| !c.action().is_busy(&rt)));
        assert_eq!(rt.pending_timers(), 0);
    }
}
