//! Property animation
//!
//! Drives one property of a target object from a start value to `to` over
//! `duration_ms`, advancing once per tick against the runtime clock. The
//! property's interpolator computes intermediate values and the last frame
//! always writes `to` exactly.
//!
//! A property made transitionable with [`Runtime::transitionable`] can have an
//! animation bound to it; [`change`] then animates writes instead of applying
//! them at once.

use coral_core::{
    transition_property, Lifecycle, LogLevel, ObjectId, Result, Runtime, Value,
};

use crate::action::{Action, AsAction, Body};
use crate::easing::Easing;

/// Duration of an animation that was not given one
pub const DEFAULT_DURATION_MS: u64 = 3_000;

pub(crate) struct AnimationBody {
    target: Option<ObjectId>,
    property: String,
    from: Option<Value>,
    to: Value,
    duration_ms: u64,
    easing: Easing,
    // per run
    start_value: Value,
    started_ms: u64,
}

impl Default for AnimationBody {
    fn default() -> Self {
        Self {
            target: None,
            property: String::new(),
            from: None,
            to: Value::Null,
            duration_ms: DEFAULT_DURATION_MS,
            easing: Easing::default(),
            start_value: Value::Null,
            started_ms: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PropertyAnimation(Action);

impl AsAction for PropertyAnimation {
    fn action(&self) -> Action {
        self.0
    }
}

impl From<PropertyAnimation> for ObjectId {
    fn from(animation: PropertyAnimation) -> Self {
        animation.0.id()
    }
}

impl PropertyAnimation {
    pub const TYPE_NAME: &'static str = "PropertyAnimation";

    pub fn new(rt: &mut Runtime) -> Result<Self> {
        Action::create(rt, Self::TYPE_NAME, Body::Animation(AnimationBody::default())).map(Self)
    }

    /// Wrap an existing object, if it is a property animation
    pub fn from_id(rt: &Runtime, id: ObjectId) -> Option<Self> {
        let action = Action::from_id(rt, id)?;
        match action.state(rt)?.body {
            Body::Animation(_) => Some(Self(action)),
            _ => None,
        }
    }

    fn body<'a>(&self, rt: &'a Runtime) -> Option<&'a AnimationBody> {
        match &self.0.state(rt)?.body {
            Body::Animation(body) => Some(body),
            _ => None,
        }
    }

    fn body_mut<'a>(&self, rt: &'a mut Runtime) -> Option<&'a mut AnimationBody> {
        match &mut self.0.state_mut(rt)?.body {
            Body::Animation(body) => Some(body),
            _ => None,
        }
    }

    /// Animate property `property` of `target`
    pub fn set_target(&self, rt: &mut Runtime, target: ObjectId, property: &str) {
        if let Some(body) = self.body_mut(rt) {
            body.target = Some(target);
            body.property = property.to_string();
        }
    }

    pub fn target(&self, rt: &Runtime) -> Option<(ObjectId, String)> {
        let body = self.body(rt)?;
        Some((body.target?, body.property.clone()))
    }

    /// Start value; `None` starts from the property's value at the beginning
    /// of each run
    pub fn set_from(&self, rt: &mut Runtime, from: Option<Value>) {
        if let Some(body) = self.body_mut(rt) {
            body.from = from;
        }
    }

    pub fn set_to(&self, rt: &mut Runtime, to: impl Into<Value>) {
        if let Some(body) = self.body_mut(rt) {
            body.to = to.into();
        }
    }

    pub fn set_duration(&self, rt: &mut Runtime, ms: u64) {
        if let Some(body) = self.body_mut(rt) {
            body.duration_ms = ms;
        }
    }

    pub fn duration(&self, rt: &Runtime) -> u64 {
        self.body(rt).map_or(DEFAULT_DURATION_MS, |b| b.duration_ms)
    }

    pub fn set_easing(&self, rt: &mut Runtime, easing: Easing) {
        if let Some(body) = self.body_mut(rt) {
            body.easing = easing;
        }
    }
}

fn log_warning(rt: &Runtime, animation: Action, message: &str) {
    let message = format!("{}: {}", rt.describe(animation.id()), message);
    rt.log(animation.id(), "animation", LogLevel::Warning, &message);
}

pub(crate) fn run(rt: &mut Runtime, animation: Action, run: u64) {
    if !animation.is_running(rt, run) {
        animation.finish(rt, run);
        return;
    }
    let handle = PropertyAnimation(animation);
    let Some((target, property)) = handle.target(rt) else {
        log_warning(rt, animation, "no target to animate");
        animation.finish(rt, run);
        return;
    };
    let from = handle.body(rt).and_then(|b| b.from.clone());
    let start_value = match from {
        Some(value) => value,
        None => match rt.get_property(target, &property) {
            Ok(value) => value,
            Err(err) => {
                log_warning(rt, animation, &err.to_string());
                animation.finish(rt, run);
                return;
            }
        },
    };
    let now = rt.now_ms();
    if let Some(body) = handle.body_mut(rt) {
        body.start_value = start_value;
        body.started_ms = now;
    }
    frame(rt, handle, run);
}

fn frame(rt: &mut Runtime, animation: PropertyAnimation, run: u64) {
    let action = animation.action();
    if !action.is_running(rt, run) {
        action.finish(rt, run);
        return;
    }
    let Some(body) = animation.body(rt) else {
        return;
    };
    let Some(target) = body.target.filter(|t| rt.is_alive(*t)) else {
        action.finish(rt, run);
        return;
    };
    let property = body.property.clone();
    let elapsed = rt.now_ms().saturating_sub(body.started_ms);
    let done = elapsed >= body.duration_ms;
    let value = if done {
        body.to.clone()
    } else {
        let t = body.easing.apply(elapsed as f64 / body.duration_ms as f64);
        rt.interpolate(target, &property, &body.start_value, &body.to, t)
    };

    if let Err(err) = rt.set_property(target, &property, value) {
        log_warning(rt, action, &err.to_string());
        action.finish(rt, run);
        return;
    }
    if done {
        action.finish(rt, run);
    } else {
        rt.defer(action.id(), Some("frame"), move |rt| frame(rt, animation, run));
    }
}

/// The property keeps the value of the last frame
pub(crate) fn stop(rt: &mut Runtime, animation: Action, run: u64) {
    rt.cancel_deferred(animation.id(), "frame");
    animation.finish(rt, run);
}

/// Bind `animation` as the transition of property `name` of `target`
pub fn bind_transition(
    rt: &mut Runtime,
    target: ObjectId,
    name: &str,
    animation: PropertyAnimation,
) -> Result<()> {
    rt.set_property(target, &transition_property(name), animation.id())
}

/// Write `value` to property `name` of `target`, animated when an enabled
/// transition is bound to the property and the target is running.
///
/// A transition already in flight is stopped and restarted from the current
/// value.
pub fn change(rt: &mut Runtime, target: ObjectId, name: &str, value: impl Into<Value>) -> Result<()> {
    let value = value.into();
    rt.get_property(target, name)?;

    let transition = rt
        .get_property(target, &transition_property(name))
        .ok()
        .and_then(|bound| bound.as_object())
        .and_then(|id| PropertyAnimation::from_id(rt, id))
        .filter(|animation| animation.action().is_enabled(rt));
    let animation = match transition {
        Some(animation) if rt.lifecycle(target) == Lifecycle::Running => animation,
        _ => return rt.set_property(target, name, value),
    };

    animation.action().stop(rt);
    if let Some(body) = animation.body_mut(rt) {
        body.target = Some(target);
        body.property = name.to_string();
        body.from = None;
        body.to = value;
    }
    animation.action().start(rt);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use coral_core::{ManualClock, Property};

    fn setup() -> (Runtime, ManualClock, ObjectId) {
        let clock = ManualClock::new(0);
        let mut rt = Runtime::new().with_clock(clock.clone());
        let item = rt.create("Item");
        rt.declare_property(item, "x", Property::stored(0)).unwrap();
        (rt, clock, item)
    }

    #[test]
    fn test_frames_follow_the_clock() {
        let (mut rt, clock, item) = setup();
        let animation = PropertyAnimation::new(&mut rt).unwrap();
        animation.set_target(&mut rt, item, "x");
        animation.set_to(&mut rt, 100);
        animation.set_duration(&mut rt, 100);
        animation.set_easing(&mut rt, Easing::Linear);

        let done = animation.action().start(&mut rt);
        assert_eq!(rt.get_property(item, "x").unwrap(), Value::Int(0));

        clock.advance(25);
        rt.tick();
        assert_eq!(rt.get_property(item, "x").unwrap(), Value::Int(25));

        clock.advance(100);
        rt.tick();
        assert_eq!(rt.get_property(item, "x").unwrap(), Value::Int(100));
        assert!(done.is_resolved());
        assert!(!rt.is_deferred_pending(animation.id(), "frame"));
    }

    #[test]
    fn test_stop_keeps_the_current_value() {
        let (mut rt, clock, item) = setup();
        let animation = PropertyAnimation::new(&mut rt).unwrap();
        animation.set_target(&mut rt, item, "x");
        animation.set_from(&mut rt, Some(Value::Int(10)));
        animation.set_to(&mut rt, 20);
        animation.set_duration(&mut rt, 10);
        animation.set_easing(&mut rt, Easing::Linear);

        animation.action().start(&mut rt);
        assert_eq!(rt.get_property(item, "x").unwrap(), Value::Int(10));
        clock.advance(3);
        rt.tick();
        assert!(animation.action().stop(&mut rt).is_resolved());
        assert_eq!(rt.get_property(item, "x").unwrap(), Value::Int(13));
        assert_eq!(rt.tick(), 0);
    }

    #[test]
    fn test_change_writes_directly_without_transition() {
        let (mut rt, _clock, item) = setup();
        rt.transitionable(item, "x", None).unwrap();
        rt.init(item).unwrap();
        change(&mut rt, item, "x", 7).unwrap();
        assert_eq!(rt.get_property(item, "x").unwrap(), Value::Int(7));
        assert!(change(&mut rt, item, "missing", 1).is_err());
    }

    #[test]
    fn test_change_animates_through_bound_transition() {
        let (mut rt, clock, item) = setup();
        rt.transitionable(item, "x", None).unwrap();
        let animation = PropertyAnimation::new(&mut rt).unwrap();
        animation.set_duration(&mut rt, 100);
        animation.set_easing(&mut rt, Easing::Linear);
        bind_transition(&mut rt, item, "x", animation).unwrap();

        // not running yet: applied at once
        change(&mut rt, item, "x", 40).unwrap();
        assert_eq!(rt.get_property(item, "x").unwrap(), Value::Int(40));

        rt.init(item).unwrap();
        change(&mut rt, item, "x", 140).unwrap();
        assert!(animation.action().is_busy(&rt));
        assert_eq!(rt.get_property(item, "x").unwrap(), Value::Int(40));

        clock.advance(50);
        rt.tick();
        assert_eq!(rt.get_property(item, "x").unwrap(), Value::Int(90));

        // retargeting restarts from where it is
        change(&mut rt, item, "x", 0).unwrap();
        clock.advance(100);
        rt.tick();
        assert_eq!(rt.get_property(item, "x").unwrap(), Value::Int(0));
        assert!(!animation.action().is_busy(&rt));
    }

    #[test]
    fn test_disabled_transition_is_bypassed() {
        let (mut rt, _clock, item) = setup();
        rt.transitionable(item, "x", None).unwrap();
        let animation = PropertyAnimation::new(&mut rt).unwrap();
        bind_transition(&mut rt, item, "x", animation).unwrap();
        animation.action().set_enabled(&mut rt, false).unwrap();
        rt.init(item).unwrap();

        change(&mut rt, item, "x", 5).unwrap();
        assert_eq!(rt.get_property(item, "x").unwrap(), Value::Int(5));
        assert!(!animation.action().is_busy(&rt));
    }
}
