//! Error types, the thread-local diagnostic channel, and report formatting.
//!
//! Errors propagate as [`DeriveError`] values; in parallel, the last
//! diagnostic string is kept in a per-thread cell for hosts that integrate
//! at a flat boundary. The cell is cleared on entry to each registration
//! and read back with [`last_error`].
//!
//! [`format_report`] renders the user-facing block described by the
//! registration API: a header naming the registration, an echo of the
//! expression, a caret line under the error position, and the diagnostic.

use crate::parser::ParseError;
use crate::resolve::SemanticError;
use metra_types::NameError;
use std::cell::RefCell;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Any failure surfaced by the public registry operations.
#[derive(Debug, Error)]
pub enum DeriveError {
    /// Lexical or syntactic failure; carries the offset into the
    /// expression text
    #[error("{0}")]
    Parse(ParseError),

    /// Name already registered
    #[error("Duplicate derived metric name")]
    DuplicateName,

    /// Name does not match the dotted-identifier syntax
    #[error(transparent)]
    InvalidName(#[from] NameError),

    /// Type, unit or semantics violation while binding
    #[error(transparent)]
    Semantic(#[from] SemanticError),

    /// Configuration file or directory could not be read
    #[error("cannot load {path}: {source}")]
    Config {
        /// Offending path
        path: PathBuf,
        /// Underlying I/O failure
        source: io::Error,
    },
}

impl DeriveError {
    /// Byte offset into the registered expression text to point at, when
    /// the failure has one (0 for a duplicate name, per the registration
    /// contract).
    pub fn position(&self) -> Option<usize> {
        match self {
            DeriveError::Parse(e) => Some(e.offset),
            DeriveError::DuplicateName => Some(0),
            _ => None,
        }
    }
}

thread_local! {
    static LAST_ERROR: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// The diagnostic left by the most recent failed operation on this thread,
/// if any.
pub fn last_error() -> Option<String> {
    LAST_ERROR.with(|slot| slot.borrow().clone())
}

pub(crate) fn clear_last_error() {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = None);
}

pub(crate) fn set_last_error(diagnostic: &str) {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(diagnostic.to_string()));
}

/// Width of one echoed expression line in a report.
const ECHO_WIDTH: usize = 64;

/// Render a user-facing error report.
///
/// The expression echo is at most two lines: for a long expression, the
/// chunk containing `offset` and the chunk before it. The caret lands
/// under the offending byte.
pub fn format_report(name: &str, source: &str, offset: usize, diagnostic: &str) -> String {
    let offset = offset.min(source.len());
    let chunk = offset / ECHO_WIDTH;
    let start = chunk.saturating_sub(1) * ECHO_WIDTH;

    let mut out = format!("derived metric {}:\n", name);
    for line_start in (start..source.len().max(start + 1)).step_by(ECHO_WIDTH).take(2) {
        let line_end = (line_start + ECHO_WIDTH).min(source.len());
        out.push_str(&source[line_start..line_end]);
        out.push('\n');
        if (line_start..line_start + ECHO_WIDTH).contains(&offset) {
            out.push_str(&" ".repeat(offset - line_start));
            out.push_str("^\n");
        }
    }
    out.push_str(diagnostic);
    out.push('\n');
    out
}
