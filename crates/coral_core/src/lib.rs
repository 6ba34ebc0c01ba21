//! Coral Core Runtime
//!
//! This crate provides the object runtime the rest of Coral is built on:
//!
//! - **Managed Objects**: Arena-owned objects with ownership trees, references and deterministic teardown
//! - **Properties**: Declared values and getters with change notification
//! - **Events**: Named per-object events with ordered, loop-guarded dispatch
//! - **Deferred Updates**: Coalescing next-tick work, timers and task queues
//! - **List Models**: Change-notifying record sequences for views
//!
//! # Example
//!
//! ```rust
//! use coral_core::{Property, Runtime, Value};
//!
//! let mut rt = Runtime::new();
//! let item = rt.create("Item");
//! rt.declare_property(item, "width", Property::stored(10)).unwrap();
//!
//! let observer = rt.create("Observer");
//! rt.connect(item, "widthChanged", observer, |_, args| {
//!     println!("width is now {:?}", args[0]);
//! })
//! .unwrap();
//!
//! rt.init(item).unwrap();
//! rt.set_property(item, "width", 20).unwrap();
//! assert_eq!(rt.get_property(item, "width").unwrap(), Value::Int(20));
//!
//! rt.destroy(item).unwrap();
//! assert!(!rt.is_alive(item));
//! ```

pub mod clock;
pub mod completion;
pub mod config;
pub mod defer;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod list_model;
pub mod log;
pub mod object;
pub mod property;
pub mod queue;
pub mod runtime;
pub mod status;
pub mod value;

pub use clock::{Clock, ManualClock, SystemClock};
pub use completion::{Completion, Resolver};
pub use config::RuntimeConfig;
pub use error::{ObjectError, Result};
pub use events::{event_names, ConnectionMonitor, HandlerResult, SafeCallback};
pub use lifecycle::{Lifecycle, LifecycleEvent, LifecycleMachine};
pub use list_model::{model_events, Comparator, ListModel};
pub use log::{LogLevel, LogRecord, LogSink, RecordingSink, TracingSink};
pub use object::ObjectId;
pub use property::{changed_event, transition_property, Getter, Interpolator, Property, Setter};
pub use queue::QueueTicket;
pub use runtime::Runtime;
pub use status::{ObjectStatus, StatusReport};
pub use value::Value;
