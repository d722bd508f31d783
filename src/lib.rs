//! lum-debug - Debug flag registry with stack capture and error records
//!
//! This library keeps named debug flags (booleans or integer levels), loads
//! them from a small `key=value` config format, captures stack traces on
//! demand and normalizes errors into structured, JSON-loggable records.

pub mod config;
pub mod error;
pub mod error_log;
pub mod exception;
pub mod flag_value;
pub mod registry;
pub mod stack_trace;

pub use config::{LoaderOptions, MalformedEntryPolicy};
pub use error::{DebugError, Result};
pub use error_log::{ErrorLog, MemoryErrorLog, StderrErrorLog, TracingErrorLog};
pub use exception::{CapturedError, Exception, LogRecord};
pub use flag_value::FlagValue;
pub use registry::DebugRegistry;
pub use stack_trace::{StackFrame, UnresolvedStack};
