//! Error types for flag loading

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading debug flags
#[derive(Error, Debug)]
pub enum DebugError {
    /// A config token had no `=` separator or an empty key
    #[error("Malformed config entry: {token:?} (expected key=value)")]
    MalformedConfigEntry { token: String },

    /// The config path exists but could not be read
    #[error("Failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for flag loading operations
pub type Result<T> = std::result::Result<T, DebugError>;

impl DebugError {
    /// Numeric code used when this error is normalized into a log record
    pub fn code(&self) -> i64 {
        match self {
            DebugError::MalformedConfigEntry { .. } => 1,
            DebugError::Io { source, .. } => source.raw_os_error().map_or(2, i64::from),
        }
    }
}
