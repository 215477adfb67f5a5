//! Recursive parser for derived-metric expressions.
//!
//! The entry point is [`parse`]: lex the registration's expression text,
//! run the precedence-climbing grammar, and require end of input. All
//! errors carry the byte offset where lexing of the offending token began,
//! so callers can point into the original expression text.

mod expr;
mod stream;
mod units;

pub use stream::TokenStream;

use crate::ast::Expr;
use std::fmt;

/// Parse failure: a diagnostic string plus a byte offset into the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// Human-readable cause
    pub diagnostic: String,
    /// Byte offset of the offending token in the expression text
    pub offset: usize,
}

impl ParseError {
    pub(crate) fn new(diagnostic: impl Into<String>, offset: usize) -> ParseError {
        ParseError {
            diagnostic: diagnostic.into(),
            offset,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.diagnostic)
    }
}

impl std::error::Error for ParseError {}

/// Parse a complete expression (production: `expr EOS`).
pub fn parse(source: &str) -> Result<Expr, ParseError> {
    let mut stream = TokenStream::new(source);
    let root = expr::parse_expr(&mut stream)?;

    if let Some((err, offset)) = stream.lex_error() {
        return Err(ParseError::new(err.to_string(), *offset));
    }
    if !stream.at_end() {
        return Err(ParseError::new("Syntax error", stream.offset()));
    }
    Ok(root)
}
