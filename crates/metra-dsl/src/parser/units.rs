//! Units clause sub-parser.
//!
//! After a numeric literal the grammar accepts a units clause: a sequence
//! of unit keywords, each optionally raised with `unit^n`, and denominator
//! units introduced by `/unit`. Unit keywords are ordinary name tokens
//! (plus the `count` and `min` function keywords); they are only
//! interpreted as units here, and a `/` is only consumed when a unit
//! keyword follows it, so `5 / metric` stays a division.

use super::{ParseError, TokenStream};
use crate::lexer::{unit_keyword, Token, UnitWord};
use metra_types::{TimeScale, Units};

/// Classify the current token as a unit word, honouring the rule that a
/// function keyword followed by `(` is a function, not a unit.
fn unit_at(stream: &TokenStream<'_>, n: usize) -> Option<UnitWord> {
    let next_is_paren = matches!(stream.peek_nth(n + 1), Some(Token::LParen));
    match stream.peek_nth(n) {
        Some(Token::Name(s)) => unit_keyword(s),
        Some(Token::Count) if !next_is_paren => Some(UnitWord::Count),
        Some(Token::Min) if !next_is_paren => Some(UnitWord::Time(TimeScale::Min)),
        _ => None,
    }
}

/// Parse a (possibly empty) units clause.
pub(super) fn parse_units(stream: &mut TokenStream<'_>) -> Result<Units, ParseError> {
    let mut units = Units::NONE;

    loop {
        if let Some(word) = unit_at(stream, 0) {
            stream.advance();
            apply(stream, &mut units, word, 1)?;
        } else if matches!(stream.peek(), Some(Token::Slash)) {
            // Only a units-clause `/` if a unit keyword follows.
            match unit_at(stream, 1) {
                Some(word) => {
                    stream.advance();
                    stream.advance();
                    apply(stream, &mut units, word, -1)?;
                }
                None => break,
            }
        } else {
            break;
        }
    }

    Ok(units)
}

/// Fold one unit word (with optional `^n`) into the accumulated units.
fn apply(
    stream: &mut TokenStream<'_>,
    units: &mut Units,
    word: UnitWord,
    sign: i8,
) -> Result<(), ParseError> {
    let mut exponent = sign;
    if matches!(stream.peek(), Some(Token::Caret)) {
        let caret_offset = stream.offset();
        stream.advance();
        match stream.advance() {
            Some(Token::Integer(n)) => exponent = sign * n as i8,
            _ => {
                return Err(ParseError::new(
                    "Integer constant expected to follow ^",
                    caret_offset,
                ))
            }
        }
    }

    match word {
        UnitWord::Space(scale) => {
            units.dim_space += exponent;
            units.scale_space = scale;
        }
        UnitWord::Time(scale) => {
            units.dim_time += exponent;
            units.scale_time = scale;
        }
        UnitWord::Count => {
            units.dim_count += exponent;
        }
    }
    Ok(())
}
