//! Typed values stored under debug flags
//!
//! A flag holds either a boolean switch or an integer verbosity level. The
//! comparison rules in [`FlagValue::satisfies`] depend on which of the two a
//! flag and its check value are, so the tags are kept explicit.

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Value of a single debug flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Int(i64),
}

impl FlagValue {
    /// Loose truthiness: `false` and `0` are falsy, everything else is truthy
    pub fn is_truthy(&self) -> bool {
        match *self {
            FlagValue::Bool(b) => b,
            FlagValue::Int(i) => i != 0,
        }
    }

    /// Decide whether this stored value passes a check
    ///
    /// # Rules
    ///
    /// 1. Both booleans: exact equality.
    /// 2. Both integers: stored value must be `>=` the check value.
    /// 3. Check given but tags differ: both truthy or both falsy.
    /// 4. No check: a boolean is returned as-is, an integer must be `> 0`.
    ///
    /// Rule 2 is inclusive while rule 4 is strict, so a stored `0` passes
    /// `Some(Int(0))` but not `None`.
    pub fn satisfies(&self, check: Option<FlagValue>) -> bool {
        match (*self, check) {
            (FlagValue::Bool(stored), Some(FlagValue::Bool(wanted))) => stored == wanted,
            (FlagValue::Int(stored), Some(FlagValue::Int(wanted))) => stored >= wanted,
            (stored, Some(wanted)) => stored.is_truthy() == wanted.is_truthy(),
            (FlagValue::Bool(stored), None) => stored,
            (FlagValue::Int(stored), None) => stored > 0,
        }
    }

    /// Interpret a raw config value
    ///
    /// `"true"` and `"false"` (case-sensitive) become booleans, anything else
    /// goes through [`parse_lenient_int`].
    pub fn from_config_value(raw: &str) -> Self {
        match raw {
            "true" => FlagValue::Bool(true),
            "false" => FlagValue::Bool(false),
            other => FlagValue::Int(parse_lenient_int(other)),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            FlagValue::Bool(b) => Some(b),
            FlagValue::Int(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match *self {
            FlagValue::Int(i) => Some(i),
            FlagValue::Bool(_) => None,
        }
    }
}

/// Parse the leading number of a string as an integer, defaulting to 0
///
/// Accepts leading whitespace, an optional sign and the longest numeric
/// prefix that follows; trailing garbage is ignored. A prefix with a
/// fraction or exponent (`1.5e3`) is read as a float and truncated toward
/// zero. Values past the `i64` range saturate.
pub fn parse_lenient_int(raw: &str) -> i64 {
    let s = raw.trim_start();
    let bytes = s.as_bytes();
    let (negative, start) = match bytes.first() {
        Some(b'-') => (true, 1),
        Some(b'+') => (false, 1),
        _ => (false, 0),
    };

    let count_digits = |from: usize| bytes[from..].iter().take_while(|b| b.is_ascii_digit()).count();

    let int_end = start + count_digits(start);
    let mut end = int_end;
    let mut has_fraction = false;
    if bytes.get(end) == Some(&b'.') {
        let frac_digits = count_digits(end + 1);
        if int_end > start || frac_digits > 0 {
            end += 1 + frac_digits;
            has_fraction = true;
        }
    }
    if end == start {
        return 0;
    }

    // An exponent only counts when at least one digit follows it
    let mut has_exponent = false;
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let sign_len = usize::from(matches!(bytes.get(end + 1), Some(b'+' | b'-')));
        let exp_digits = count_digits(end + 1 + sign_len);
        if exp_digits > 0 {
            end += 1 + sign_len + exp_digits;
            has_exponent = true;
        }
    }

    if has_fraction || has_exponent {
        // `as` truncates toward zero and saturates at the i64 bounds
        return s[..end].parse::<f64>().map_or(0, |f| f as i64);
    }

    let mut value: i64 = 0;
    for &b in &bytes[start..int_end] {
        let digit = i64::from(b - b'0');
        value = if negative {
            value.saturating_mul(10).saturating_sub(digit)
        } else {
            value.saturating_mul(10).saturating_add(digit)
        };
    }
    value
}

impl fmt::Display for FlagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagValue::Bool(b) => write!(f, "{}", b),
            FlagValue::Int(i) => write!(f, "{}", i),
        }
    }
}

impl FromStr for FlagValue {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(FlagValue::from_config_value(s.trim()))
    }
}

impl From<bool> for FlagValue {
    fn from(b: bool) -> Self {
        FlagValue::Bool(b)
    }
}

impl From<i64> for FlagValue {
    fn from(i: i64) -> Self {
        FlagValue::Int(i)
    }
}

impl From<i32> for FlagValue {
    fn from(i: i32) -> Self {
        FlagValue::Int(i64::from(i))
    }
}
