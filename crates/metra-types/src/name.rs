//! Dotted metric names.
//!
//! Metric names are dot-separated identifier paths (`disk.dev.read`). Each
//! segment starts with a letter and continues with letters, digits or
//! underscores. [`MetricName`] is a validated wrapper used as the registry
//! key; the segment helpers back namespace traversal.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A dotted metric name that has passed syntax validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MetricName(String);

/// Name syntax violation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid derived metric name")]
pub struct NameError;

/// Check a candidate against `[A-Za-z][A-Za-z0-9_]*(\.[A-Za-z][A-Za-z0-9_]*)*`.
pub fn is_valid_name(s: &str) -> bool {
    !s.is_empty()
        && s.split('.').all(|seg| {
            let mut chars = seg.chars();
            match chars.next() {
                Some(c) if c.is_ascii_alphabetic() => {
                    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
                }
                _ => false,
            }
        })
}

impl MetricName {
    /// Validate and wrap a name.
    pub fn new(s: impl Into<String>) -> Result<MetricName, NameError> {
        let s = s.into();
        if is_valid_name(&s) {
            Ok(MetricName(s))
        } else {
            Err(NameError)
        }
    }

    /// The full dotted name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate the dot-separated segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// Prefix match on a dot boundary: the empty prefix matches everything,
    /// otherwise `prefix` must equal the name or be followed by a `.` in it.
    pub fn matches_prefix(&self, prefix: &str) -> bool {
        if prefix.is_empty() {
            return true;
        }
        match self.0.strip_prefix(prefix) {
            Some("") => true,
            Some(rest) => rest.starts_with('.'),
            None => false,
        }
    }

    /// The first segment past `prefix`, and whether further segments follow
    /// it. Returns `None` when the name equals the prefix or does not match.
    pub fn next_segment(&self, prefix: &str) -> Option<(&str, bool)> {
        let rest = if prefix.is_empty() {
            &self.0[..]
        } else {
            match self.0.strip_prefix(prefix) {
                Some(rest) => rest.strip_prefix('.')?,
                None => return None,
            }
        };
        if rest.is_empty() {
            return None;
        }
        match rest.split_once('.') {
            Some((seg, _)) => Some((seg, true)),
            None => Some((rest, false)),
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for MetricName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Allows map lookups keyed by `MetricName` to take a `&str`.
impl std::borrow::Borrow<str> for MetricName {
    fn borrow(&self) -> &str {
        &self.0
    }
}
