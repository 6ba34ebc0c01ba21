//! Wait action
//!
//! Finishes at a target time computed from the clock when the run begins.
//! The target comes from an [`Until`] predicate; the helpers below cover the
//! common "in n seconds" and "at the next wall-clock boundary" cases. Without
//! a predicate the wait lasts `default_wait_ms` from the runtime config.

use std::rc::Rc;

use coral_core::{ObjectId, Result, Runtime};

use crate::action::{Action, AsAction, Body};

/// Maps "now" in milliseconds to the target time in milliseconds
pub type Until = Rc<dyn Fn(u64) -> u64>;

const SECOND: u64 = 1_000;
const MINUTE: u64 = 60 * SECOND;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

#[derive(Default)]
pub(crate) struct WaitBody {
    until: Option<Until>,
}

/// `ms` milliseconds after now
pub fn after_ms(ms: u64) -> Until {
    Rc::new(move |now| now.saturating_add(ms))
}

/// `secs` seconds after now
pub fn seconds(secs: u64) -> Until {
    after_ms(secs.saturating_mul(SECOND))
}

/// The next time the seconds of the minute read `second`
pub fn at_second(second: u64) -> Until {
    Rc::new(move |now| next_boundary(now, MINUTE, (second % 60) * SECOND))
}

/// The next time the minutes of the hour read `minute`
pub fn at_minute(minute: u64) -> Until {
    Rc::new(move |now| next_boundary(now, HOUR, (minute % 60) * MINUTE))
}

/// The next time the UTC hour of the day reads `hour`
pub fn at_utc_hour(hour: u64) -> Until {
    Rc::new(move |now| next_boundary(now, DAY, (hour % 24) * HOUR))
}

/// The instant `offset` into the current `period`, or into the next one when
/// that instant is not in the future
fn next_boundary(now: u64, period: u64, offset: u64) -> u64 {
    let target = now - now % period + offset;
    if target <= now {
        target + period
    } else {
        target
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WaitAction(Action);

impl AsAction for WaitAction {
    fn action(&self) -> Action {
        self.0
    }
}

impl From<WaitAction> for ObjectId {
    fn from(action: WaitAction) -> Self {
        action.0.id()
    }
}

impl WaitAction {
    pub const TYPE_NAME: &'static str = "WaitAction";

    pub fn new(rt: &mut Runtime) -> Result<Self> {
        Action::create(rt, Self::TYPE_NAME, Body::Wait(WaitBody::default())).map(Self)
    }

    /// Wait until the time `until` computes at the start of each run
    pub fn set_until(&self, rt: &mut Runtime, until: Until) {
        if let Some(body) = self.body_mut(rt) {
            body.until = Some(until);
        }
    }

    /// Wait a fixed number of milliseconds
    pub fn set_duration(&self, rt: &mut Runtime, ms: u64) {
        self.set_until(rt, after_ms(ms));
    }

    fn body_mut<'a>(&self, rt: &'a mut Runtime) -> Option<&'a mut WaitBody> {
        match &mut self.0.state_mut(rt)?.body {
            Body::Wait(body) => Some(body),
            _ => None,
        }
    }
}

pub(crate) fn run(rt: &mut Runtime, wait: Action, run: u64) {
    if !wait.is_running(rt, run) {
        wait.finish(rt, run);
        return;
    }
    let until = match wait.state(rt).map(|s| &s.body) {
        Some(Body::Wait(body)) => body.until.clone(),
        _ => None,
    };
    let now = rt.now_ms();
    let target = match until {
        Some(until) => until(now),
        None => now.saturating_add(rt.config().default_wait_ms),
    };
    tracing::trace!(action = ?wait.id(), delay = target.saturating_sub(now), "waiting");
    // aborted or not, the run is over once the timer resolves
    rt.wait(wait.id(), target.saturating_sub(now), Some("wait"))
        .then(rt, move |rt, _| wait.finish(rt, run));
}

pub(crate) fn stop(rt: &mut Runtime, wait: Action, run: u64) {
    if !rt.abort_wait(wait.id(), "wait") {
        wait.finish(rt, run);
    }
}
