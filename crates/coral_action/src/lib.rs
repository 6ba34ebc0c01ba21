//! Coral Action System
//!
//! Composable actions built on the Coral object runtime.
//!
//! # Features
//!
//! - **Actions**: Managed objects with a begin/finish cycle, `enabled`, `busy` and `status`
//! - **Sequencing**: Sequential and parallel groups with optional repeat
//! - **Waits**: Fixed delays and wall-clock boundaries driven by the runtime clock
//! - **Scripts**: Synchronous or completion-returning steps
//! - **Property Animations**: Eased, per-tick interpolation and animated property changes
//!
//! # Example
//!
//! ```rust
//! use coral_action::{AsAction, ScriptAction, SequentialAction, WaitAction};
//! use coral_core::{ManualClock, Runtime};
//!
//! let clock = ManualClock::new(0);
//! let mut rt = Runtime::new().with_clock(clock.clone());
//!
//! let intro = SequentialAction::new(&mut rt).unwrap();
//! let pause = WaitAction::new(&mut rt).unwrap();
//! pause.set_duration(&mut rt, 500);
//! let greet = ScriptAction::new(&mut rt).unwrap();
//! greet.set_script(&mut rt, |_| {
//!     println!("hello");
//!     Ok(())
//! });
//! intro.add(&mut rt, pause);
//! intro.add(&mut rt, greet);
//!
//! let done = intro.action().start(&mut rt);
//! clock.advance(500);
//! rt.run_until_idle();
//! assert!(done.is_resolved());
//! ```

pub mod action;
pub mod animation;
pub mod easing;
pub mod parallel;
pub mod script;
pub mod sequential;
pub mod wait;

pub use action::{action_events, Action, ActionStatus, AsAction};
pub use animation::{bind_transition, change, PropertyAnimation};
pub use easing::Easing;
pub use parallel::ParallelAction;
pub use script::ScriptAction;
pub use sequential::SequentialAction;
pub use wait::{after_ms, at_minute, at_second, at_utc_hour, seconds, Until, WaitAction};
