//! Script action
//!
//! Runs a piece of code as a step of a sequence. A synchronous script
//! finishes when it returns; errors are logged on the action and do not
//! interrupt the surrounding sequence. An asynchronous script finishes when
//! the completion it returns resolves.

use std::cell::RefCell;
use std::rc::Rc;

use coral_core::{Completion, LogLevel, ObjectId, Result, Runtime};

use crate::action::{Action, AsAction, Body};

type SyncScript = Rc<RefCell<dyn FnMut(&mut Runtime) -> anyhow::Result<()>>>;
type AsyncScript = Rc<RefCell<dyn FnMut(&mut Runtime) -> Completion<()>>>;

#[derive(Default)]
pub(crate) enum ScriptBody {
    #[default]
    Empty,
    Sync(SyncScript),
    Async(AsyncScript),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScriptAction(Action);

impl AsAction for ScriptAction {
    fn action(&self) -> Action {
        self.0
    }
}

impl From<ScriptAction> for ObjectId {
    fn from(action: ScriptAction) -> Self {
        action.0.id()
    }
}

impl ScriptAction {
    pub const TYPE_NAME: &'static str = "ScriptAction";

    /// A script action that does nothing until a script is set
    pub fn new(rt: &mut Runtime) -> Result<Self> {
        Action::create(rt, Self::TYPE_NAME, Body::Script(ScriptBody::default())).map(Self)
    }

    pub fn set_script<F>(&self, rt: &mut Runtime, script: F)
    where
        F: FnMut(&mut Runtime) -> anyhow::Result<()> + 'static,
    {
        self.set_body(rt, ScriptBody::Sync(Rc::new(RefCell::new(script))));
    }

    /// Run `script` and finish once its completion resolves
    pub fn set_async_script<F>(&self, rt: &mut Runtime, script: F)
    where
        F: FnMut(&mut Runtime) -> Completion<()> + 'static,
    {
        self.set_body(rt, ScriptBody::Async(Rc::new(RefCell::new(script))));
    }

    fn set_body(&self, rt: &mut Runtime, script: ScriptBody) {
        if let Some(state) = self.0.state_mut(rt) {
            state.body = Body::Script(script);
        }
    }
}

fn log_error(rt: &Runtime, action: Action, message: &str) {
    let message = format!("{}: {}", rt.describe(action.id()), message);
    rt.log(action.id(), "action", LogLevel::Error, &message);
}

pub(crate) fn run(rt: &mut Runtime, action: Action, run: u64) {
    if !action.is_running(rt, run) {
        action.finish(rt, run);
        return;
    }
    let script = match action.state(rt).map(|s| &s.body) {
        Some(Body::Script(ScriptBody::Sync(f))) => ScriptBody::Sync(f.clone()),
        Some(Body::Script(ScriptBody::Async(f))) => ScriptBody::Async(f.clone()),
        _ => ScriptBody::Empty,
    };

    match script {
        ScriptBody::Empty => action.finish(rt, run),
        ScriptBody::Sync(script) => {
            let outcome = match script.try_borrow_mut() {
                Ok(mut f) => (&mut *f)(rt),
                Err(_) => Err(anyhow::anyhow!("script started itself while running")),
            };
            if let Err(err) = outcome {
                log_error(rt, action, &format!("script failed: {err:#}"));
            }
            action.finish(rt, run);
        }
        ScriptBody::Async(script) => {
            let done = match script.try_borrow_mut() {
                Ok(mut f) => (&mut *f)(rt),
                Err(_) => {
                    log_error(rt, action, "script started itself while running");
                    Completion::resolved(())
                }
            };
            done.then(rt, move |rt, ()| action.finish(rt, run));
        }
    }
}

/// An asynchronous script keeps going on its own; the run ends right away
pub(crate) fn stop(rt: &mut Runtime, action: Action, run: u64) {
    action.finish(rt, run);
}
