//! Lexical analysis for derived-metric expressions.
//!
//! Tokenization uses logos. Function keywords (`avg`, `rate`, ...) lex as
//! dedicated tokens, but the grammar only treats them as functions when the
//! next token is `(`; elsewhere the parser folds them back into metric
//! names, so a host metric may legally be called `avg` or `rate.limit`.
//!
//! The units sub-lexer of the grammar is driven from here as well: unit
//! keywords (`kbyte`, `sec`, ...) arrive as ordinary [`Token::Name`] tokens
//! and are classified by [`unit_keyword`] when the parser is accepting a
//! units clause after a numeric literal.

use logos::Logos;
use metra_types::{SpaceScale, TimeScale};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Lexical error, published verbatim as the diagnostic string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
pub enum LexError {
    /// Input matched no token rule
    #[default]
    #[error("Illegal character")]
    IllegalCharacter,
    /// Integer literal does not fit an unsigned 32-bit value
    #[error("Constant value too large")]
    ConstantTooLarge,
}

fn lex_integer(lex: &mut logos::Lexer<Token>) -> Result<u32, LexError> {
    lex.slice().parse::<u32>().map_err(|_| LexError::ConstantTooLarge)
}

fn lex_double(lex: &mut logos::Lexer<Token>) -> Option<f64> {
    lex.slice().parse::<f64>().ok()
}

/// Expression token.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(error = LexError)]
pub enum Token {
    // === Punctuation ===
    /// Operator `+`
    #[token("+")]
    Plus,
    /// Operator `-`
    #[token("-")]
    Minus,
    /// Operator `*`
    #[token("*")]
    Star,
    /// Operator `/`
    #[token("/")]
    Slash,
    /// Delimiter `(`
    #[token("(")]
    LParen,
    /// Delimiter `)`
    #[token(")")]
    RParen,
    /// Conditional `?`
    #[token("?")]
    Quest,
    /// Conditional `:`
    #[token(":")]
    Colon,
    /// Unit power `^` (meaningful only inside a units clause)
    #[token("^")]
    Caret,

    // === Relational ===
    /// Operator `<`
    #[token("<")]
    Lt,
    /// Operator `<=`
    #[token("<=")]
    LtEq,
    /// Operator `==`
    #[token("==")]
    EqEq,
    /// Operator `>=`
    #[token(">=")]
    GtEq,
    /// Operator `>`
    #[token(">")]
    Gt,
    /// Operator `!=`
    #[token("!=")]
    BangEq,

    // === Boolean ===
    /// Operator `&&` (a lone `&` is illegal)
    #[token("&&")]
    AndAnd,
    /// Operator `||` (a lone `|` is illegal)
    #[token("||")]
    OrOr,
    /// Operator `!`
    #[token("!")]
    Bang,

    // === Function keywords ===
    /// Function `avg`
    #[token("avg")]
    Avg,
    /// Function `count` (also the count unit keyword)
    #[token("count")]
    Count,
    /// Function `delta`
    #[token("delta")]
    Delta,
    /// Function `max`
    #[token("max")]
    Max,
    /// Function `min` (also the minute unit keyword)
    #[token("min")]
    Min,
    /// Function `sum`
    #[token("sum")]
    Sum,
    /// Function `rate`
    #[token("rate")]
    Rate,
    /// Function `instant`
    #[token("instant")]
    Instant,
    /// Function `anon`
    #[token("anon")]
    Anon,

    // === Literals ===
    /// Unsigned decimal integer constant
    #[regex(r"[0-9]+", lex_integer)]
    Integer(u32),

    /// Floating constant; the `.` may start the literal
    #[regex(r"[0-9]+\.[0-9]*", lex_double)]
    #[regex(r"\.[0-9]+", lex_double)]
    Double(f64),

    /// Dotted metric name (letter first, then letters/digits/`_`, segments
    /// joined by `.`)
    #[regex(r"[A-Za-z][A-Za-z0-9_]*(\.[A-Za-z][A-Za-z0-9_]*)*", |lex| Arc::<str>::from(lex.slice()))]
    Name(Arc<str>),
}

impl Token {
    /// Function-keyword text, if this token is one.
    pub fn function_name(&self) -> Option<&'static str> {
        match self {
            Token::Avg => Some("avg"),
            Token::Count => Some("count"),
            Token::Delta => Some("delta"),
            Token::Max => Some("max"),
            Token::Min => Some("min"),
            Token::Sum => Some("sum"),
            Token::Rate => Some("rate"),
            Token::Instant => Some("instant"),
            Token::Anon => Some("anon"),
            _ => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Quest => write!(f, "?"),
            Token::Colon => write!(f, ":"),
            Token::Caret => write!(f, "^"),
            Token::Lt => write!(f, "<"),
            Token::LtEq => write!(f, "<="),
            Token::EqEq => write!(f, "=="),
            Token::GtEq => write!(f, ">="),
            Token::Gt => write!(f, ">"),
            Token::BangEq => write!(f, "!="),
            Token::AndAnd => write!(f, "&&"),
            Token::OrOr => write!(f, "||"),
            Token::Bang => write!(f, "!"),
            Token::Integer(n) => write!(f, "{}", n),
            Token::Double(x) => write!(f, "{}", x),
            Token::Name(s) => write!(f, "{}", s),
            other => write!(f, "{}", other.function_name().unwrap_or("?")),
        }
    }
}

/// Classification of a unit keyword inside a units clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitWord {
    /// Space unit at a scale
    Space(SpaceScale),
    /// Time unit at a scale
    Time(TimeScale),
    /// Count unit
    Count,
}

/// Look up a unit keyword (singular or plural).
///
/// Only consulted when the parser is accepting a units clause; these words
/// are ordinary metric-name components everywhere else.
pub fn unit_keyword(word: &str) -> Option<UnitWord> {
    use UnitWord::*;
    let unit = match word {
        "byte" | "bytes" => Space(SpaceScale::Byte),
        "kbyte" | "kbytes" => Space(SpaceScale::KByte),
        "mbyte" | "mbytes" => Space(SpaceScale::MByte),
        "gbyte" | "gbytes" => Space(SpaceScale::GByte),
        "tbyte" | "tbytes" => Space(SpaceScale::TByte),
        "pbyte" | "pbytes" => Space(SpaceScale::PByte),
        "ebyte" | "ebytes" => Space(SpaceScale::EByte),
        "nsec" | "nsecs" | "nanosec" | "nanosecs" | "nanosecond" | "nanoseconds" => {
            Time(TimeScale::Nsec)
        }
        "usec" | "usecs" | "microsec" | "microsecs" | "microsecond" | "microseconds" => {
            Time(TimeScale::Usec)
        }
        "msec" | "msecs" | "millisec" | "millisecs" | "millisecond" | "milliseconds" => {
            Time(TimeScale::Msec)
        }
        "sec" | "secs" | "second" | "seconds" => Time(TimeScale::Sec),
        "min" | "mins" | "minute" | "minutes" => Time(TimeScale::Min),
        "hour" | "hours" => Time(TimeScale::Hour),
        "count" | "counts" => Count,
        _ => return None,
    };
    Some(unit)
}
