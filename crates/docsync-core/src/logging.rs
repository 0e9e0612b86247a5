//! Logging sink for the sync clients
//!
//! Clients log through an injected [`SyncLogger`] instead of a global, so
//! tests can capture what was logged. Logging never affects control flow.

use std::sync::{Mutex, PoisonError};

/// Diagnostic sink used by the sync clients
///
/// `event` is the wire event (or operation) the message relates to.
pub trait SyncLogger: Send + Sync {
    fn debug(&self, event: &str, message: &str);
    fn error(&self, event: &str, message: &str);
}

/// Default sink forwarding to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl SyncLogger for TracingLogger {
    fn debug(&self, event: &str, message: &str) {
        tracing::debug!(event, "{}", message);
    }

    fn error(&self, event: &str, message: &str) {
        tracing::error!(event, "{}", message);
    }
}

/// Log level of a captured record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Error,
}

/// One captured log line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub level: LogLevel,
    pub event: String,
    pub message: String,
}

/// Sink that keeps every record in memory
#[derive(Debug, Default)]
pub struct CapturingLogger {
    records: Mutex<Vec<LogRecord>>,
}

impl CapturingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records captured so far
    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Captured records at the error level
    pub fn errors(&self) -> Vec<LogRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.level == LogLevel::Error)
            .collect()
    }

    fn push(&self, level: LogLevel, event: &str, message: &str) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(LogRecord {
                level,
                event: event.to_string(),
                message: message.to_string(),
            });
    }
}

impl SyncLogger for CapturingLogger {
    fn debug(&self, event: &str, message: &str) {
        self.push(LogLevel::Debug, event, message);
    }

    fn error(&self, event: &str, message: &str) {
        self.push(LogLevel::Error, event, message);
    }
}
