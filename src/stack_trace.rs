//! In-process stack capture
//!
//! Walks the current thread's stack with the `backtrace` crate and resolves
//! each frame to a [`StackFrame`]. Argument values are never recorded by the
//! walker; frames handed in by error types may carry them, and
//! [`StackFrame::without_args`] drops them before they are logged.
//!
//! The walker's own frames are located by function address, so trimming
//! also works in stripped binaries where no symbol names are available.

use backtrace::{Backtrace, BacktraceFrame};
use serde::{Deserialize, Serialize};

/// Symbol prefixes of frames that belong to the capture machinery itself
const INTERNAL_PREFIXES: &[&str] = &["backtrace::", "lum_debug::stack_trace::capture"];

/// A single resolved call-stack entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    /// Demangled function name, without the hash suffix
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    /// Instruction pointer, formatted as hex
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Start address of the enclosing function, formatted as hex
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol_address: Option<String>,
    /// Argument values, when the frame source recorded any
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

impl StackFrame {
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: Some(function.into()),
            ..Self::default()
        }
    }

    pub fn with_location(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Drop recorded argument values
    pub fn without_args(mut self) -> Self {
        self.args.clear();
        self
    }

    fn from_backtrace_frame(frame: &BacktraceFrame) -> Self {
        let mut record = StackFrame {
            address: Some(format!("{:#x}", frame.ip() as usize)),
            symbol_address: Some(format!("{:#x}", frame.symbol_address() as usize)),
            ..StackFrame::default()
        };

        // Inlined frames resolve to several symbols; keep the innermost
        if let Some(symbol) = frame.symbols().first() {
            record.function = symbol.name().map(|name| format!("{:#}", name));
            record.file = symbol.filename().map(|path| path.display().to_string());
            record.line = symbol.lineno();
            record.column = symbol.colno();
        }
        record
    }

    fn is_internal(&self) -> bool {
        self.function.as_deref().is_some_and(|name| {
            INTERNAL_PREFIXES
                .iter()
                .any(|prefix| name.starts_with(prefix))
        })
    }
}

/// A captured stack whose symbols have not been looked up yet
///
/// Walking the stack is cheap; symbol resolution is not. Errors capture an
/// `UnresolvedStack` up front and resolve it only when a trace is logged.
#[derive(Debug, Clone)]
pub struct UnresolvedStack {
    frames: Vec<BacktraceFrame>,
    // Entry frame not found by address; trim by symbol name after resolving
    trim_by_name: bool,
    limit: usize,
}

impl UnresolvedStack {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Whether any frame already carries symbol information
    pub fn has_symbols(&self) -> bool {
        self.frames.iter().any(|f| !f.symbols().is_empty())
    }

    /// Look up symbols and convert to frame records
    pub fn resolve(&self) -> Vec<StackFrame> {
        let mut backtrace = Backtrace::from(self.frames.clone());
        backtrace.resolve();

        let mut frames: Vec<StackFrame> = backtrace
            .frames()
            .iter()
            .map(StackFrame::from_backtrace_frame)
            .collect();

        if self.trim_by_name {
            let start = frames
                .iter()
                .rposition(StackFrame::is_internal)
                .map_or(0, |i| i + 1);
            frames.drain(..start);
            if self.limit > 0 {
                frames.truncate(self.limit);
            }
        }
        frames
    }
}

/// Capture and resolve the current call stack
///
/// The first returned frame is the caller of `capture` (frames of the stack
/// walker are removed). `limit == 0` means no depth limit.
#[inline(never)]
pub fn capture(limit: usize) -> Vec<StackFrame> {
    walk(capture as usize, limit).resolve()
}

/// Capture the current call stack without resolving symbols
#[inline(never)]
pub fn capture_unresolved(limit: usize) -> UnresolvedStack {
    walk(capture_unresolved as usize, limit)
}

/// Walk the stack and drop every frame up to and including `entry`
fn walk(entry: usize, limit: usize) -> UnresolvedStack {
    let mut frames = Vec::with_capacity(32);
    let mut entry_index = None;

    backtrace::trace(|frame| {
        if entry_index.is_none() && frame.symbol_address() as usize == entry {
            entry_index = Some(frames.len());
        }
        frames.push(BacktraceFrame::from(frame.clone()));
        // Stop once `limit` frames past the entry frame are collected
        !(limit > 0 && entry_index.is_some_and(|i| frames.len() > i + limit))
    });

    match entry_index {
        Some(i) => {
            frames.drain(..=i);
            if limit > 0 {
                frames.truncate(limit);
            }
            UnresolvedStack {
                frames,
                trim_by_name: false,
                limit,
            }
        }
        None => UnresolvedStack {
            frames,
            trim_by_name: true,
            limit,
        },
    }
}

/// Render any serializable diagnostic value as pretty-printed JSON
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("{{\"serialization_error\": {:?}}}", e.to_string()))
}
