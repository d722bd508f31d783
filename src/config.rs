//! Debug flag config files
//!
//! The format is deliberately small:
//!
//! ```text
//! flag1=1,flag2=3
//! flag3=true,flag4=false
//! ```
//!
//! Entries are separated by newlines and/or commas. Values `true` and
//! `false` are booleans; anything else is read as a lenient base-10 integer
//! (see [`parse_lenient_int`](crate::flag_value::parse_lenient_int)).

use crate::error::{DebugError, Result};
use crate::flag_value::FlagValue;
use std::fs;
use std::path::Path;

/// Environment variable naming a config file to load at startup
pub const CONFIG_PATH_ENV: &str = "LUM_DEBUG_CONFIG";

/// Environment variable holding inline flags, e.g. `LUM_DEBUG=sql=2,exception=true`
pub const INLINE_FLAGS_ENV: &str = "LUM_DEBUG";

/// What to do with an entry that has no `=` or an empty key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MalformedEntryPolicy {
    /// Fail the whole load with [`DebugError::MalformedConfigEntry`]
    #[default]
    Reject,
    /// Drop the entry and log a warning
    Skip,
}

/// Options for parsing and loading config text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoaderOptions {
    pub policy: MalformedEntryPolicy,
}

impl LoaderOptions {
    pub fn skip_malformed() -> Self {
        Self {
            policy: MalformedEntryPolicy::Skip,
        }
    }
}

/// Parse config text into `(flag, value)` pairs, in file order
///
/// Nothing is applied here, so a rejected input has no partial effect.
pub fn parse_config_str(text: &str, options: LoaderOptions) -> Result<Vec<(String, FlagValue)>> {
    let mut entries = Vec::new();

    for token in text
        .trim()
        .split(|c: char| c == '\n' || c == ',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        match parse_entry(token) {
            Some(entry) => entries.push(entry),
            None => match options.policy {
                MalformedEntryPolicy::Reject => {
                    return Err(DebugError::MalformedConfigEntry {
                        token: token.to_string(),
                    });
                }
                MalformedEntryPolicy::Skip => {
                    tracing::warn!(token, "Skipping malformed debug config entry");
                }
            },
        }
    }

    Ok(entries)
}

/// Split a single `key=value` token
fn parse_entry(token: &str) -> Option<(String, FlagValue)> {
    let (key, raw) = token.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), FlagValue::from_config_value(raw.trim())))
}

/// Read and parse a config file
///
/// Returns `Ok(None)` when the path does not exist.
pub fn read_config_file(
    path: &Path,
    options: LoaderOptions,
) -> Result<Option<Vec<(String, FlagValue)>>> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No debug config file, skipping");
        return Ok(None);
    }

    let contents = fs::read_to_string(path).map_err(|source| DebugError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    parse_config_str(&contents, options).map(Some)
}
