//! Debug flag registry
//!
//! [`DebugRegistry`] holds named debug flags and answers "is this flag on?"
//! queries. It also owns the diagnostic sink used by [`DebugRegistry::trace`]
//! and [`DebugRegistry::parse_exception`].
//!
//! # Example
//!
//! ```
//! use lum_debug::{DebugRegistry, FlagValue};
//!
//! let debug = DebugRegistry::new();
//! debug.set("sql", 2);
//! debug.set("exception", true);
//!
//! assert!(debug.enabled("sql"));
//! assert!(debug.is_enabled("sql", Some(FlagValue::Int(2))));
//! assert!(!debug.is_enabled("sql", Some(FlagValue::Int(3))));
//! assert!(!debug.enabled("cache"));
//! ```
//!
//! A registry is normally built once at startup and shared by reference.
//! Code that prefers a single process-wide instance can use
//! [`DebugRegistry::global`].

use crate::config::{self, LoaderOptions, CONFIG_PATH_ENV, INLINE_FLAGS_ENV};
use crate::error::Result;
use crate::error_log::{ErrorLog, TracingErrorLog};
use crate::exception::{Exception, LogRecord};
use crate::flag_value::FlagValue;
use crate::stack_trace::{self, StackFrame};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

/// Flag consulted by [`DebugRegistry::parse_exception`] to attach traces
pub const EXCEPTION_FLAG: &str = "exception";

/// Prefix written before exception records in the diagnostic log
pub const EXCEPTION_LOG_PREFIX: &str = "Exception occurred: ";

static GLOBAL_REGISTRY: OnceLock<DebugRegistry> = OnceLock::new();

/// Thread-safe store of debug flags
pub struct DebugRegistry {
    flags: RwLock<HashMap<String, FlagValue>>,
    error_log: Arc<dyn ErrorLog>,
}

impl DebugRegistry {
    /// Create an empty registry that logs through `tracing`
    pub fn new() -> Self {
        Self {
            flags: RwLock::new(HashMap::new()),
            error_log: Arc::new(TracingErrorLog),
        }
    }

    /// Replace the diagnostic sink
    pub fn with_error_log(mut self, error_log: impl ErrorLog + 'static) -> Self {
        self.error_log = Arc::new(error_log);
        self
    }

    /// Process-wide registry, created empty on first use
    pub fn global() -> &'static DebugRegistry {
        GLOBAL_REGISTRY.get_or_init(DebugRegistry::new)
    }

    /// Build a registry from the environment
    ///
    /// Loads the file named by `LUM_DEBUG_CONFIG` (if set), then applies the
    /// inline flags in `LUM_DEBUG` on top, so inline values win.
    pub fn from_env() -> Result<Self> {
        let registry = Self::new();

        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
            registry.load_config(Path::new(&path))?;
        }

        if let Ok(inline) = std::env::var(INLINE_FLAGS_ENV) {
            let entries = config::parse_config_str(&inline, LoaderOptions::default())?;
            tracing::debug!(count = entries.len(), "Applying inline debug flags");
            registry.extend(entries);
        }

        Ok(registry)
    }

    /// Stored value of `flag`, or `None` if it was never set
    pub fn get(&self, flag: &str) -> Option<FlagValue> {
        self.read_flags().get(flag).copied()
    }

    /// Stored value of `flag`, or `default` if it was never set
    pub fn get_or(&self, flag: &str, default: impl Into<FlagValue>) -> FlagValue {
        self.get(flag).unwrap_or_else(|| default.into())
    }

    /// Set (or overwrite) a flag
    pub fn set(&self, flag: impl Into<String>, value: impl Into<FlagValue>) {
        let flag = flag.into();
        let value = value.into();
        tracing::trace!(flag = %flag, value = %value, "Setting debug flag");
        self.write_flags().insert(flag, value);
    }

    /// Set many flags at once, later entries overwriting earlier ones
    pub fn extend<I, K, V>(&self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FlagValue>,
    {
        let mut flags = self.write_flags();
        for (flag, value) in entries {
            flags.insert(flag.into(), value.into());
        }
    }

    /// Remove every flag
    ///
    /// Flags are otherwise only ever overwritten. This exists to reset the
    /// [`global`](Self::global) instance between tests that share it.
    pub fn clear(&self) {
        tracing::trace!("Clearing debug flags");
        self.write_flags().clear();
    }

    /// Check a flag against an optional check value
    ///
    /// Unset flags are never enabled. For set flags the rules of
    /// [`FlagValue::satisfies`] apply.
    pub fn is_enabled(&self, flag: &str, check: Option<FlagValue>) -> bool {
        self.get(flag).is_some_and(|stored| stored.satisfies(check))
    }

    /// Shorthand for `is_enabled(flag, None)`
    pub fn enabled(&self, flag: &str) -> bool {
        self.is_enabled(flag, None)
    }

    /// Sorted copy of all flags
    pub fn snapshot(&self) -> BTreeMap<String, FlagValue> {
        self.read_flags()
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read_flags().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_flags().is_empty()
    }

    /// Capture the current call stack
    ///
    /// `limit == 0` means unlimited depth. When `log` is set the frames are
    /// written to the diagnostic log as pretty-printed JSON. The first frame
    /// is this method, the second its caller.
    #[inline(never)]
    pub fn trace(&self, log: bool, limit: usize) -> Vec<StackFrame> {
        let frames = stack_trace::capture(limit);
        if log {
            self.error_log.write(&stack_trace::to_pretty_json(&frames));
        }
        frames
    }

    /// Load a flag config file with the default (rejecting) options
    ///
    /// A missing file is not an error and leaves the registry untouched.
    /// Returns the number of flags applied.
    pub fn load_config(&self, path: impl AsRef<Path>) -> Result<usize> {
        self.load_config_with(path, LoaderOptions::default())
    }

    /// Load a flag config file
    pub fn load_config_with(&self, path: impl AsRef<Path>, options: LoaderOptions) -> Result<usize> {
        let path = path.as_ref();
        let Some(entries) = config::read_config_file(path, options)? else {
            return Ok(0);
        };

        let count = entries.len();
        self.extend(entries);
        tracing::debug!(path = %path.display(), count, "Loaded debug config");
        Ok(count)
    }

    /// Normalize an error into a [`LogRecord`]
    ///
    /// The error's stack trace (arguments stripped) is included when the
    /// `exception` flag is enabled. With `errorlog` the record is also written
    /// to the diagnostic log, prefixed with `"Exception occurred: "`.
    pub fn parse_exception<E: Exception + ?Sized>(&self, exception: &E, errorlog: bool) -> LogRecord {
        let record = LogRecord::from_exception(exception, self.enabled(EXCEPTION_FLAG));
        if errorlog {
            self.error_log
                .write(&format!("{}{}", EXCEPTION_LOG_PREFIX, record.to_pretty_json()));
        }
        record
    }

    // Every write leaves the map consistent, so a poisoned lock is still usable
    fn read_flags(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, FlagValue>> {
        self.flags.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_flags(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, FlagValue>> {
        self.flags.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for DebugRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DebugRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebugRegistry")
            .field("flags", &self.snapshot())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_log::MemoryErrorLog;
    use crate::exception::CapturedError;

    fn registry_with_log() -> (DebugRegistry, MemoryErrorLog) {
        let log = MemoryErrorLog::new();
        (DebugRegistry::new().with_error_log(log.clone()), log)
    }

    #[test]
    fn test_set_then_get() {
        let debug = DebugRegistry::new();
        debug.set("verbose", 3);
        debug.set("sql", true);
        assert_eq!(debug.get("verbose"), Some(FlagValue::Int(3)));
        assert_eq!(debug.get("sql"), Some(FlagValue::Bool(true)));
    }

    #[test]
    fn test_set_overwrites_across_types() {
        let debug = DebugRegistry::new();
        debug.set("verbose", 3);
        debug.set("verbose", false);
        assert_eq!(debug.get("verbose"), Some(FlagValue::Bool(false)));
        assert_eq!(debug.len(), 1);
    }

    #[test]
    fn test_get_missing_ignores_default() {
        let debug = DebugRegistry::new();
        assert_eq!(debug.get("nope"), None);
    }

    #[test]
    fn test_get_or_honors_default() {
        let debug = DebugRegistry::new();
        assert_eq!(debug.get_or("nope", 5), FlagValue::Int(5));
        debug.set("nope", true);
        assert_eq!(debug.get_or("nope", 5), FlagValue::Bool(true));
    }

    #[test]
    fn test_unset_flag_is_never_enabled() {
        let debug = DebugRegistry::new();
        assert!(!debug.enabled("x"));
        assert!(!debug.is_enabled("x", Some(FlagValue::Bool(false))));
        assert!(!debug.is_enabled("x", Some(FlagValue::Int(0))));
    }

    #[test]
    fn test_is_enabled_branches() {
        let debug = DebugRegistry::new();

        debug.set("b", true);
        assert!(debug.is_enabled("b", Some(true.into())));
        assert!(!debug.is_enabled("b", Some(false.into())));

        debug.set("n", 5);
        assert!(debug.is_enabled("n", Some(FlagValue::Int(5))));
        assert!(!debug.is_enabled("n", Some(FlagValue::Int(6))));

        debug.set("one", 1);
        assert!(debug.is_enabled("one", Some(true.into())));

        debug.set("zero", 0);
        assert!(!debug.enabled("zero"));
        assert!(debug.is_enabled("zero", Some(FlagValue::Int(0))));
        assert!(debug.is_enabled("zero", Some(false.into())));
    }

    #[test]
    fn test_extend_and_snapshot() {
        let debug = DebugRegistry::new();
        assert!(debug.is_empty());
        debug.extend([("b", FlagValue::Int(2)), ("a", FlagValue::Bool(true))]);

        let snapshot = debug.snapshot();
        let keys: Vec<&String> = snapshot.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(debug.len(), 2);
    }

    #[test]
    fn test_clear_removes_all_flags() {
        let debug = DebugRegistry::new();
        debug.extend([("a", FlagValue::Int(1)), ("b", FlagValue::Bool(true))]);
        debug.clear();
        assert!(debug.is_empty());
        assert!(!debug.enabled("a"));
        assert_eq!(debug.get("b"), None);
    }

    #[test]
    fn test_trace_without_log_writes_nothing() {
        let (debug, log) = registry_with_log();
        let frames = debug.trace(false, 0);
        assert!(!frames.is_empty());
        assert!(log.is_empty());
    }

    #[test]
    fn test_trace_with_log_writes_json() {
        let (debug, log) = registry_with_log();
        let frames = debug.trace(true, 3);
        assert!(frames.len() <= 3);

        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        let parsed: Vec<StackFrame> = serde_json::from_str(&entries[0]).unwrap();
        assert_eq!(parsed, frames);
    }

    #[test]
    fn test_parse_exception_without_flag_omits_trace() {
        let (debug, log) = registry_with_log();
        let err = CapturedError::new("RuntimeError", "bad state").with_code(9);

        let record = debug.parse_exception(&err, false);
        assert_eq!(record.classname, "RuntimeError");
        assert_eq!(record.code, 9);
        assert!(record.trace.is_none());
        assert!(log.is_empty());
    }

    #[test]
    fn test_parse_exception_with_flag_includes_trace() {
        let (debug, _log) = registry_with_log();
        debug.set(EXCEPTION_FLAG, 1);
        let err = CapturedError::new("RuntimeError", "bad state")
            .with_trace(vec![StackFrame::new("app::run").with_args(["token"])]);

        let record = debug.parse_exception(&err, false);
        let trace = record.trace.unwrap();
        assert_eq!(trace.len(), 1);
        assert!(trace[0].args.is_empty());
    }

    #[test]
    fn test_parse_exception_flag_uses_auto_detection() {
        let (debug, _log) = registry_with_log();
        let err = CapturedError::new("E", "m");

        debug.set(EXCEPTION_FLAG, 0);
        assert!(debug.parse_exception(&err, false).trace.is_none());

        debug.set(EXCEPTION_FLAG, false);
        assert!(debug.parse_exception(&err, false).trace.is_none());

        debug.set(EXCEPTION_FLAG, true);
        assert!(debug.parse_exception(&err, false).trace.is_some());
    }

    #[test]
    fn test_parse_exception_errorlog_prefix() {
        let (debug, log) = registry_with_log();
        let err = CapturedError::new("E", "logged");

        let record = debug.parse_exception(&err, true);
        let entries = log.entries();
        assert_eq!(entries.len(), 1);

        let body = entries[0].strip_prefix(EXCEPTION_LOG_PREFIX).unwrap();
        let parsed: LogRecord = serde_json::from_str(body).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_concurrent_set_and_get() {
        let debug = Arc::new(DebugRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let debug = Arc::clone(&debug);
                std::thread::spawn(move || {
                    for n in 0..100 {
                        debug.set(format!("t{}", i), n);
                        assert!(debug.get(&format!("t{}", i)).is_some());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(debug.len(), 8);
        assert_eq!(debug.get("t0"), Some(FlagValue::Int(99)));
    }

    #[test]
    fn test_debug_output_lists_flags() {
        let debug = DebugRegistry::new();
        debug.set("sql", 1);
        let rendered = format!("{:?}", debug);
        assert!(rendered.contains("DebugRegistry"));
        assert!(rendered.contains("sql"));
    }
}
