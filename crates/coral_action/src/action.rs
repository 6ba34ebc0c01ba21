//! Action base
//!
//! An action is a managed object with a begin/finish cycle:
//!
//! ```text
//! Idle --start--> Running --body done--> Idle
//!                    |                     ^
//!                    +--stop--> Stopping --+
//! ```
//!
//! `start()` while a run is in progress joins that run instead of beginning
//! another. `finish` is emitted exactly once per run, including runs that are
//! stopped, disabled or torn down half way.
//!
//! What a run does is decided by the action's [`Body`]: a group of child
//! actions run in sequence or in parallel, a wait, a script or a property
//! animation.

use coral_core::{
    Completion, Lifecycle, LogLevel, ObjectError, ObjectId, Property, Resolver, Result, Runtime, Value,
};

use crate::animation::AnimationBody;
use crate::script::ScriptBody;
use crate::wait::WaitBody;
use crate::{animation, parallel, script, sequential, wait};

/// Events of every action
pub mod action_events {
    /// Emitted when a run begins
    pub const BEGIN: &str = "begin";
    /// Emitted once when a run ends, however it ends
    pub const FINISH: &str = "finish";
}

/// Run state of an action
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ActionStatus {
    #[default]
    Idle,
    Running,
    Stopping,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Idle => "idle",
            ActionStatus::Running => "running",
            ActionStatus::Stopping => "stopping",
        }
    }
}

/// Child bookkeeping of sequential and parallel actions
#[derive(Debug, Default)]
pub(crate) struct Group {
    pub(crate) repeat: bool,
    /// Child currently awaited by a sequence
    pub(crate) current: Option<ObjectId>,
    /// Children of a parallel cycle that have not finished yet
    pub(crate) remaining: usize,
}

pub(crate) enum Body {
    Sequential(Group),
    Parallel(Group),
    Wait(WaitBody),
    Script(ScriptBody),
    Animation(AnimationBody),
}

pub(crate) struct ActionState {
    pub(crate) enabled: bool,
    pub(crate) status: ActionStatus,
    /// Incremented on each begin; continuations of older runs are ignored
    pub(crate) run: u64,
    finish_waiters: Vec<Resolver<()>>,
    stop_waiters: Vec<Resolver<()>>,
    pub(crate) body: Body,
}

/// Anything that is backed by an action object
pub trait AsAction {
    fn action(&self) -> Action;

    fn id(&self) -> ObjectId {
        self.action().id()
    }
}

/// Handle to any action object
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Action(ObjectId);

impl AsAction for Action {
    fn action(&self) -> Action {
        *self
    }
}

impl From<Action> for ObjectId {
    fn from(action: Action) -> Self {
        action.0
    }
}

impl Action {
    /// Create an action object with `body`, declaring the common properties
    /// and events
    pub(crate) fn create(rt: &mut Runtime, type_name: &str, body: Body) -> Result<Action> {
        let id = rt.create_component(
            type_name,
            ActionState {
                enabled: true,
                status: ActionStatus::Idle,
                run: 0,
                finish_waiters: Vec::new(),
                stop_waiters: Vec::new(),
                body,
            },
        );
        rt.register_event(id, action_events::BEGIN)?;
        rt.register_event(id, action_events::FINISH)?;
        rt.declare_property(
            id,
            "enabled",
            Property::computed(|rt, id| {
                Value::Bool(rt.component::<ActionState>(id).is_some_and(|s| s.enabled))
            })
            .with_setter(|rt, id, value| {
                let enabled = value.as_bool().ok_or_else(|| ObjectError::TypeMismatch {
                    expected: "bool",
                    found: value.type_name().to_string(),
                })?;
                let busy = match rt.component_mut::<ActionState>(id) {
                    Some(state) => {
                        state.enabled = enabled;
                        state.status != ActionStatus::Idle
                    }
                    None => return Err(ObjectError::Destroyed(id)),
                };
                if !enabled && busy {
                    Action(id).stop(rt);
                }
                Ok(())
            }),
        )?;
        rt.declare_property(
            id,
            "busy",
            Property::computed(|rt, id| Value::Bool(Action(id).is_busy(rt))),
        )?;
        rt.declare_property(
            id,
            "status",
            Property::computed(|rt, id| Value::from(Action(id).status(rt).as_str())),
        )?;
        rt.on_terminate(id, |rt, id| {
            let action = Action(id);
            if let Some(run) = action.active_run(rt) {
                action.finish(rt, run);
            }
        })?;
        Ok(Action(id))
    }

    /// Wrap an existing object, if it is an action
    pub fn from_id(rt: &Runtime, id: ObjectId) -> Option<Action> {
        rt.has_component::<ActionState>(id).then_some(Action(id))
    }

    pub fn id(&self) -> ObjectId {
        self.0
    }

    pub(crate) fn state<'a>(&self, rt: &'a Runtime) -> Option<&'a ActionState> {
        rt.component::<ActionState>(self.0)
    }

    pub(crate) fn state_mut<'a>(&self, rt: &'a mut Runtime) -> Option<&'a mut ActionState> {
        rt.component_mut::<ActionState>(self.0)
    }

    pub fn status(&self, rt: &Runtime) -> ActionStatus {
        self.state(rt).map_or(ActionStatus::Idle, |s| s.status)
    }

    /// True between begin and finish
    pub fn is_busy(&self, rt: &Runtime) -> bool {
        self.status(rt) != ActionStatus::Idle
    }

    pub fn is_enabled(&self, rt: &Runtime) -> bool {
        self.state(rt).is_some_and(|s| s.enabled)
    }

    pub fn set_enabled(&self, rt: &mut Runtime, enabled: bool) -> Result<()> {
        rt.set_property(self.0, "enabled", enabled)
    }

    fn active_run(&self, rt: &Runtime) -> Option<u64> {
        self.state(rt)
            .filter(|s| s.status != ActionStatus::Idle)
            .map(|s| s.run)
    }

    /// Whether run `run` should keep going
    pub(crate) fn is_running(&self, rt: &Runtime, run: u64) -> bool {
        let running = self.state(rt).is_some_and(|s| {
            s.run == run && s.status == ActionStatus::Running && s.enabled
        });
        running && rt.lifecycle(self.0) < Lifecycle::Stopping
    }

    /// Begin a run, or join the one in progress.
    ///
    /// The completion resolves when the run finishes. Starting a destroyed
    /// action resolves at once.
    pub fn start(&self, rt: &mut Runtime) -> Completion<()> {
        if !rt.is_alive(self.0) {
            return Completion::resolved(());
        }
        let (completion, resolver) = Completion::pending();
        let run = match self.state_mut(rt) {
            Some(state) => {
                state.finish_waiters.push(resolver);
                if state.status != ActionStatus::Idle {
                    return completion;
                }
                state.run += 1;
                state.status = ActionStatus::Running;
                state.run
            }
            None => return Completion::resolved(()),
        };
        tracing::trace!(action = ?self.0, run, "begin");
        self.notify_status(rt);
        let _ = rt.emit(self.0, action_events::BEGIN, &[]);

        // a begin handler may already have stopped this run
        let begun = self
            .state(rt)
            .is_some_and(|s| s.run == run && s.status == ActionStatus::Running);
        if begun {
            self.run_body(rt, run);
        }
        completion
    }

    /// Ask the current run to stop.
    ///
    /// The completion resolves once the run has finished; immediately if
    /// the action is idle.
    pub fn stop(&self, rt: &mut Runtime) -> Completion<()> {
        let (completion, resolver) = Completion::pending();
        let run = match self.state_mut(rt) {
            Some(state) if state.status == ActionStatus::Running => {
                state.stop_waiters.push(resolver);
                state.status = ActionStatus::Stopping;
                state.run
            }
            Some(state) if state.status == ActionStatus::Stopping => {
                state.stop_waiters.push(resolver);
                return completion;
            }
            _ => return Completion::resolved(()),
        };
        tracing::trace!(action = ?self.0, run, "stopping");
        self.notify_status(rt);
        self.stop_body(rt, run);
        completion
    }

    /// End run `run`; later calls for the same run do nothing
    pub(crate) fn finish(&self, rt: &mut Runtime, run: u64) {
        let (finish_waiters, stop_waiters) = match self.state_mut(rt) {
            Some(state) if state.run == run && state.status != ActionStatus::Idle => {
                state.status = ActionStatus::Idle;
                match &mut state.body {
                    Body::Sequential(group) | Body::Parallel(group) => {
                        group.current = None;
                        group.remaining = 0;
                    }
                    _ => {}
                }
                (
                    std::mem::take(&mut state.finish_waiters),
                    std::mem::take(&mut state.stop_waiters),
                )
            }
            _ => return,
        };
        tracing::trace!(action = ?self.0, run, "finish");
        self.notify_status(rt);
        let _ = rt.emit(self.0, action_events::FINISH, &[]);
        for waiter in finish_waiters {
            waiter.resolve(rt, ());
        }
        for waiter in stop_waiters {
            waiter.resolve(rt, ());
        }
    }

    fn notify_status(&self, rt: &mut Runtime) {
        let _ = rt.notify_changed(self.0, "busy");
        let _ = rt.notify_changed(self.0, "status");
    }

    fn run_body(&self, rt: &mut Runtime, run: u64) {
        let kind = match self.state(rt).map(|s| &s.body) {
            Some(Body::Sequential(_)) => sequential::run,
            Some(Body::Parallel(_)) => parallel::run,
            Some(Body::Wait(_)) => wait::run,
            Some(Body::Script(_)) => script::run,
            Some(Body::Animation(_)) => animation::run,
            None => return,
        };
        kind(rt, *self, run);
    }

    fn stop_body(&self, rt: &mut Runtime, run: u64) {
        let kind = match self.state(rt).map(|s| &s.body) {
            Some(Body::Sequential(_)) => sequential::stop,
            Some(Body::Parallel(_)) => parallel::stop,
            Some(Body::Wait(_)) => wait::stop,
            Some(Body::Script(_)) => script::stop,
            Some(Body::Animation(_)) => animation::stop,
            None => return,
        };
        kind(rt, *self, run);
    }

    pub(crate) fn group<'a>(&self, rt: &'a Runtime) -> Option<&'a Group> {
        match &self.state(rt)?.body {
            Body::Sequential(group) | Body::Parallel(group) => Some(group),
            _ => None,
        }
    }

    pub(crate) fn group_mut<'a>(&self, rt: &'a mut Runtime) -> Option<&'a mut Group> {
        match &mut self.state_mut(rt)?.body {
            Body::Sequential(group) | Body::Parallel(group) => Some(group),
            _ => None,
        }
    }

    /// Child actions of a group in child order
    pub(crate) fn child_actions(&self, rt: &Runtime) -> Vec<Action> {
        rt.children(self.0)
            .into_iter()
            .filter_map(|child| Action::from_id(rt, child))
            .collect()
    }
}

/// Declare the `repeat` property of a group action
pub(crate) fn declare_repeat(rt: &mut Runtime, id: ObjectId) -> Result<()> {
    rt.declare_property(
        id,
        "repeat",
        Property::computed(|rt, id| {
            Value::Bool(Action(id).group(rt).is_some_and(|g| g.repeat))
        })
        .with_setter(|rt, id, value| {
            let repeat = value.as_bool().ok_or_else(|| ObjectError::TypeMismatch {
                expected: "bool",
                found: value.type_name().to_string(),
            })?;
            if let Some(group) = Action(id).group_mut(rt) {
                group.repeat = repeat;
            }
            Ok(())
        }),
    )
}

/// Add `child` to group action `group`.
///
/// Only actions are accepted; anything else is logged and ignored.
pub(crate) fn add_child(rt: &mut Runtime, group: Action, child: ObjectId) {
    if Action::from_id(rt, child).is_none() {
        let err = ObjectError::TypeMismatch {
            expected: "action",
            found: rt.describe(child),
        };
        let message = format!("cannot add child to {}: {}", rt.describe(group.id()), err);
        rt.log(group.id(), "action", LogLevel::Error, &message);
        return;
    }
    if let Err(err) = rt.add(group.id(), child) {
        let message = format!("cannot add child to {}: {}", rt.describe(group.id()), err);
        rt.log(group.id(), "action", LogLevel::Error, &message);
    }
}
