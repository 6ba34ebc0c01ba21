//! Object Lifecycle State Machine
//!
//! Every managed object walks the same linear chart:
//!
//! ```text
//! Created -> Initialized -> Running -> Stopping -> Destroyed -> Terminated
//! ```
//!
//! `Stop` is also accepted from `Created` and `Initialized` so that objects
//! torn down before they ever ran still pass through every teardown state.
//! Events without a matching transition leave the state unchanged.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a managed object
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Lifecycle {
    Created,
    Initialized,
    Running,
    Stopping,
    Destroyed,
    Terminated,
}

impl Lifecycle {
    /// Handlers and deferred callbacks of an object only run while this holds
    pub fn is_alive(self) -> bool {
        self < Lifecycle::Destroyed
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Lifecycle::Created => "created",
            Lifecycle::Initialized => "initialized",
            Lifecycle::Running => "running",
            Lifecycle::Stopping => "stopping",
            Lifecycle::Destroyed => "destroyed",
            Lifecycle::Terminated => "terminated",
        }
    }
}

/// Inputs of the lifecycle machine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    Initialize,
    Run,
    Stop,
    Destroy,
    Terminate,
}

/// A transition in the lifecycle chart
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    pub from: Lifecycle,
    pub event: LifecycleEvent,
    pub to: Lifecycle,
}

impl Transition {
    pub const fn new(from: Lifecycle, event: LifecycleEvent, to: Lifecycle) -> Self {
        Self { from, event, to }
    }
}

const TRANSITIONS: &[Transition] = &[
    Transition::new(Lifecycle::Created, LifecycleEvent::Initialize, Lifecycle::Initialized),
    Transition::new(Lifecycle::Initialized, LifecycleEvent::Run, Lifecycle::Running),
    Transition::new(Lifecycle::Created, LifecycleEvent::Stop, Lifecycle::Stopping),
    Transition::new(Lifecycle::Initialized, LifecycleEvent::Stop, Lifecycle::Stopping),
    Transition::new(Lifecycle::Running, LifecycleEvent::Stop, Lifecycle::Stopping),
    Transition::new(Lifecycle::Stopping, LifecycleEvent::Destroy, Lifecycle::Destroyed),
    Transition::new(Lifecycle::Destroyed, LifecycleEvent::Terminate, Lifecycle::Terminated),
];

/// Per-object lifecycle machine
#[derive(Clone, Debug)]
pub struct LifecycleMachine {
    current: Lifecycle,
    /// History of transitions (for debugging)
    history: Vec<(Lifecycle, LifecycleEvent, Lifecycle)>,
}

impl Default for LifecycleMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleMachine {
    pub fn new() -> Self {
        Self {
            current: Lifecycle::Created,
            history: Vec::new(),
        }
    }

    pub fn current(&self) -> Lifecycle {
        self.current
    }

    pub fn is_in(&self, state: Lifecycle) -> bool {
        self.current == state
    }

    /// Check if an event can trigger a transition from the current state
    pub fn can_send(&self, event: LifecycleEvent) -> bool {
        self.find(event).is_some()
    }

    /// Send an event, returning the new state if a transition fired
    pub fn send(&mut self, event: LifecycleEvent) -> Option<Lifecycle> {
        let transition = self.find(event)?;
        self.current = transition.to;
        self.history.push((transition.from, event, transition.to));
        Some(transition.to)
    }

    pub fn history(&self) -> &[(Lifecycle, LifecycleEvent, Lifecycle)] {
        &self.history
    }

    fn find(&self, event: LifecycleEvent) -> Option<&'static Transition> {
        let current = self.current;
        TRANSITIONS
            .iter()
            .find(|t| t.from == current && t.event == event)
    }
}
