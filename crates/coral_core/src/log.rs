//! Log sinks
//!
//! Object diagnostics are routed through an injectable [`LogSink`]. The sink
//! is looked up along the parent chain of the object that logs, so the root of
//! an object tree decides where its output goes; objects without a sink in
//! their ancestry fall back to the runtime's sink.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// Severity of a log record
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        }
    }
}

/// Destination for object log output
pub trait LogSink {
    fn log(&self, domain: &str, level: LogLevel, message: &str);
}

/// Forwards records to `tracing`
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, domain: &str, level: LogLevel, message: &str) {
        match level {
            LogLevel::Trace => tracing::trace!(domain, "{}", message),
            LogLevel::Debug => tracing::debug!(domain, "{}", message),
            LogLevel::Info => tracing::info!(domain, "{}", message),
            LogLevel::Warning => tracing::warn!(domain, "{}", message),
            LogLevel::Error => tracing::error!(domain, "{}", message),
        }
    }
}

/// A captured log record
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogRecord {
    pub domain: String,
    pub level: LogLevel,
    pub message: String,
}

/// Keeps every record in memory.
///
/// Clones share the buffer, which lets a collaborator hand one clone to the
/// runtime and read records back through another.
#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
    records: Rc<RefCell<Vec<LogRecord>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.borrow().clone()
    }

    /// Whether any record at `level` contains `needle`
    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.records
            .borrow()
            .iter()
            .any(|r| r.level == level && r.message.contains(needle))
    }

    pub fn clear(&self) {
        self.records.borrow_mut().clear();
    }
}

impl LogSink for RecordingSink {
    fn log(&self, domain: &str, level: LogLevel, message: &str) {
        self.records.borrow_mut().push(LogRecord {
            domain: domain.to_string(),
            level,
            message: message.to_string(),
        });
    }
}
