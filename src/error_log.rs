//! Diagnostic log sinks
//!
//! Stack traces and exception records are written as pretty-printed JSON to
//! an [`ErrorLog`]. The default sink forwards to `tracing` so the host's
//! subscriber decides where the text ends up.

use std::sync::{Arc, Mutex, PoisonError};

/// Destination for diagnostic text
pub trait ErrorLog: Send + Sync {
    /// Write one complete entry (may span several lines)
    fn write(&self, entry: &str);
}

/// Emits each entry as a `tracing` error event on target `lum_debug`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorLog;

impl ErrorLog for TracingErrorLog {
    fn write(&self, entry: &str) {
        tracing::error!(target: "lum_debug", "{}", entry);
    }
}

/// Writes each entry straight to standard error
///
/// A failed write to stderr panics.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrErrorLog;

impl ErrorLog for StderrErrorLog {
    fn write(&self, entry: &str) {
        eprintln!("{}", entry);
    }
}

/// Keeps entries in memory
///
/// Clones share the same buffer, so a handle kept by the caller sees every
/// entry written through the registry.
#[derive(Debug, Clone, Default)]
pub struct MemoryErrorLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl MemoryErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all entries written so far
    pub fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_empty(&self) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl ErrorLog for MemoryErrorLog {
    fn write(&self, entry: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.to_string());
    }
}
