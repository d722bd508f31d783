//! Error normalization into structured log records
//!
//! Any error type that implements [`Exception`] can be turned into a
//! [`LogRecord`]: class name, message, numeric code, the source location it
//! was raised at and, optionally, its stack trace with argument values
//! removed. [`CapturedError`] is a ready-made implementation that records
//! the construction site and stack automatically.

use crate::error::DebugError;
use crate::stack_trace::{self, StackFrame, UnresolvedStack};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::Location;

/// Minimal view of an error needed to build a [`LogRecord`]
pub trait Exception {
    /// Type or class name, e.g. `"std::io::Error"`
    fn class_name(&self) -> String;

    fn message(&self) -> String;

    fn code(&self) -> i64 {
        0
    }

    /// Source file the error originated from
    fn file(&self) -> String;

    fn line(&self) -> u32;

    /// Call stack at the point the error was raised, innermost first
    fn stack_trace(&self) -> Vec<StackFrame>;
}

/// Normalized, serializable description of an error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub classname: String,
    pub message: String,
    pub code: i64,
    pub file: String,
    pub line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<Vec<StackFrame>>,
}

impl LogRecord {
    /// Build a record, attaching the stripped stack trace when asked
    pub fn from_exception<E: Exception + ?Sized>(exception: &E, include_trace: bool) -> Self {
        let trace = include_trace.then(|| {
            exception
                .stack_trace()
                .into_iter()
                .map(StackFrame::without_args)
                .collect()
        });

        Self {
            classname: exception.class_name(),
            message: exception.message(),
            code: exception.code(),
            file: exception.file(),
            line: exception.line(),
            trace,
        }
    }

    pub fn to_pretty_json(&self) -> String {
        stack_trace::to_pretty_json(self)
    }
}

/// Stack attached to a [`CapturedError`]
#[derive(Debug, Clone)]
enum ErrorTrace {
    /// Walked at construction, symbols looked up on demand
    Captured(UnresolvedStack),
    Frames(Vec<StackFrame>),
}

/// An error that remembers where it was created
///
/// Construction only walks the stack; symbols are resolved when
/// [`Exception::stack_trace`] is called, i.e. when a trace is logged.
#[derive(Debug, Clone)]
pub struct CapturedError {
    class_name: String,
    message: String,
    code: i64,
    file: String,
    line: u32,
    trace: ErrorTrace,
}

impl CapturedError {
    /// Create an error at the caller's location and capture the stack
    #[track_caller]
    pub fn new(class_name: impl Into<String>, message: impl Into<String>) -> Self {
        let location = Location::caller();
        Self {
            class_name: class_name.into(),
            message: message.into(),
            code: 0,
            file: location.file().to_string(),
            line: location.line(),
            trace: ErrorTrace::Captured(stack_trace::capture_unresolved(0)),
        }
    }

    /// Wrap any error; the class name is the Rust type name of `E`
    #[track_caller]
    pub fn from_error<E: std::error::Error + ?Sized>(err: &E) -> Self {
        Self::new(std::any::type_name::<E>(), err.to_string())
    }

    pub fn with_code(mut self, code: i64) -> Self {
        self.code = code;
        self
    }

    /// Replace the captured stack, e.g. with frames from another source
    pub fn with_trace(mut self, trace: Vec<StackFrame>) -> Self {
        self.trace = ErrorTrace::Frames(trace);
        self
    }
}

impl fmt::Display for CapturedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.class_name, self.message)
    }
}

impl std::error::Error for CapturedError {}

impl From<DebugError> for CapturedError {
    #[track_caller]
    fn from(err: DebugError) -> Self {
        CapturedError::from_error(&err).with_code(err.code())
    }
}

impl Exception for CapturedError {
    fn class_name(&self) -> String {
        self.class_name.clone()
    }

    fn message(&self) -> String {
        self.message.clone()
    }

    fn code(&self) -> i64 {
        self.code
    }

    fn file(&self) -> String {
        self.file.clone()
    }

    fn line(&self) -> u32 {
        self.line
    }

    fn stack_trace(&self) -> Vec<StackFrame> {
        match &self.trace {
            ErrorTrace::Captured(stack) => stack.resolve(),
            ErrorTrace::Frames(frames) => frames.clone(),
        }
    }
}
