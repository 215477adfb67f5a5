//! Expression grammar: precedence climbing with contextual diagnostics.
//!
//! Precedence, low to high: `?:`, `|| &&`, unary `!`, relational, `+ -`,
//! `* /`, unary `-`. All binary operators associate left; `?:` associates
//! right. Every operator position produces a dedicated diagnostic when its
//! operand is missing, anchored at the operator's own byte offset.

use super::{units, ParseError, TokenStream};
use crate::ast::{anon_type_tag, BinOp, Expr, ExprKind, Func, Span, UnOp};
use crate::lexer::Token;
use metra_types::Units;
use std::sync::Arc;

/// Relational precedence; the operand of `!` starts here.
const REL_PREC: u8 = 30;

/// Binary operator precedence table.
///
/// `||` and `&&` share one level, as do all relational operators.
fn binary_op_info(token: &Token) -> Option<(u8, BinOp)> {
    let info = match token {
        Token::OrOr => (10, BinOp::Or),
        Token::AndAnd => (10, BinOp::And),
        Token::Lt => (REL_PREC, BinOp::Lt),
        Token::LtEq => (REL_PREC, BinOp::Le),
        Token::EqEq => (REL_PREC, BinOp::Eq),
        Token::GtEq => (REL_PREC, BinOp::Ge),
        Token::Gt => (REL_PREC, BinOp::Gt),
        Token::BangEq => (REL_PREC, BinOp::Ne),
        Token::Plus => (40, BinOp::Add),
        Token::Minus => (40, BinOp::Sub),
        Token::Star => (50, BinOp::Mul),
        Token::Slash => (50, BinOp::Div),
        _ => return None,
    };
    Some(info)
}

/// Can this token begin an operand?
fn starts_operand(token: &Token) -> bool {
    matches!(
        token,
        Token::Integer(_)
            | Token::Double(_)
            | Token::Name(_)
            | Token::LParen
            | Token::Minus
            | Token::Bang
    ) || token.function_name().is_some()
}

/// Diagnostic for a missing operand after `sym`.
fn follow_message(sym: &str) -> String {
    match sym {
        "+" | "-" | "*" | "/" | "<" | "<=" | "==" | ">=" | ">" | "!=" => {
            format!("Arithmetic expression expected to follow {}", sym)
        }
        "&&" | "||" | "!" => format!("Logical expression expected to follow {}", sym),
        _ => format!("Expression expected to follow {}", sym),
    }
}

/// Require that an operand starts here; a pending lexical error wins over
/// the contextual diagnostic.
///
/// The error is anchored at the unexpected token when there is one, and at
/// the operator itself (`at`) when the input just ends.
fn expect_operand(stream: &TokenStream<'_>, sym: &str, at: usize) -> Result<(), ParseError> {
    match stream.peek() {
        Some(t) if starts_operand(t) => Ok(()),
        Some(_) => Err(ParseError::new(follow_message(sym), stream.offset())),
        None => {
            if let Some((err, offset)) = stream.lex_error() {
                return Err(ParseError::new(err.to_string(), *offset));
            }
            Err(ParseError::new(follow_message(sym), at))
        }
    }
}

/// Parse a full expression (ternary level, right associative).
pub(super) fn parse_expr(stream: &mut TokenStream<'_>) -> Result<Expr, ParseError> {
    let start = stream.offset();
    let guard = parse_binary(stream, 0)?;
    if !matches!(stream.peek(), Some(Token::Quest)) {
        return Ok(guard);
    }

    let quest_at = stream.offset();
    stream.advance();
    expect_operand(stream, "?", quest_at)?;
    let then = parse_expr(stream)?;

    let colon_at = stream.offset();
    if !matches!(stream.peek(), Some(Token::Colon)) {
        if let Some((err, offset)) = stream.lex_error() {
            return Err(ParseError::new(err.to_string(), *offset));
        }
        return Err(ParseError::new(
            "':' expected in conditional expression",
            colon_at,
        ));
    }
    stream.advance();
    expect_operand(stream, ":", colon_at)?;
    let other = parse_expr(stream)?;

    Ok(Expr::new(
        ExprKind::Cond {
            guard: Box::new(guard),
            then: Box::new(then),
            other: Box::new(other),
        },
        Span::new(start as u32, stream.prev_end() as u32),
    ))
}

/// Precedence-climbing loop for binary operators.
fn parse_binary(stream: &mut TokenStream<'_>, min_prec: u8) -> Result<Expr, ParseError> {
    let start = stream.offset();
    let mut left = parse_prefix(stream)?;

    while let Some(token) = stream.peek() {
        let Some((prec, op)) = binary_op_info(token) else {
            break;
        };
        if prec < min_prec {
            break;
        }

        let op_at = stream.offset();
        stream.advance();
        expect_operand(stream, op.symbol(), op_at)?;
        let right = parse_binary(stream, prec + 1)?;

        left = Expr::new(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            Span::new(start as u32, stream.prev_end() as u32),
        );
    }

    Ok(left)
}

/// Prefix operators.
///
/// `-` binds its following atom; `!` binds everything down to relational
/// precedence, so `!a < b` reads `!(a < b)`.
fn parse_prefix(stream: &mut TokenStream<'_>) -> Result<Expr, ParseError> {
    let start = stream.offset();
    match stream.peek() {
        Some(Token::Minus) => {
            stream.advance();
            expect_operand(stream, "-", start)?;
            let operand = parse_prefix(stream)?;
            Ok(Expr::new(
                ExprKind::Unary {
                    op: UnOp::Neg,
                    operand: Box::new(operand),
                },
                Span::new(start as u32, stream.prev_end() as u32),
            ))
        }
        Some(Token::Bang) => {
            stream.advance();
            expect_operand(stream, "!", start)?;
            let operand = parse_binary(stream, REL_PREC)?;
            Ok(Expr::new(
                ExprKind::Unary {
                    op: UnOp::Not,
                    operand: Box::new(operand),
                },
                Span::new(start as u32, stream.prev_end() as u32),
            ))
        }
        _ => parse_atom(stream),
    }
}

/// Atoms: literals (with units clause), names, function calls, parens.
fn parse_atom(stream: &mut TokenStream<'_>) -> Result<Expr, ParseError> {
    let start = stream.offset();
    match stream.peek() {
        Some(Token::Integer(value)) => {
            let value = *value;
            let text: Arc<str> = Arc::from(stream.current_text().unwrap_or_default());
            stream.advance();
            let units = units::parse_units(stream)?;
            Ok(Expr::new(
                ExprKind::Integer { text, value, units },
                Span::new(start as u32, stream.prev_end() as u32),
            ))
        }
        Some(Token::Double(value)) => {
            let value = *value;
            let text: Arc<str> = Arc::from(stream.current_text().unwrap_or_default());
            stream.advance();
            let units = units::parse_units(stream)?;
            Ok(Expr::new(
                ExprKind::Double { text, value, units },
                Span::new(start as u32, stream.prev_end() as u32),
            ))
        }
        Some(Token::Name(name)) => {
            let name = name.clone();
            stream.advance();
            Ok(Expr::new(
                ExprKind::Name(name),
                Span::new(start as u32, stream.prev_end() as u32),
            ))
        }
        Some(t) if t.function_name().is_some() => {
            // A function only when the `(` follows immediately.
            if matches!(stream.peek_nth(1), Some(Token::LParen)) && stream.next_adjacent() {
                parse_func_call(stream)
            } else {
                // A function keyword without `(` is an ordinary metric name.
                let name: Arc<str> = Arc::from(t.function_name().unwrap());
                stream.advance();
                Ok(Expr::new(
                    ExprKind::Name(name),
                    Span::new(start as u32, stream.prev_end() as u32),
                ))
            }
        }
        Some(Token::LParen) => {
            stream.advance();
            expect_operand(stream, "(", start)?;
            let inner = parse_expr(stream)?;
            if !matches!(stream.peek(), Some(Token::RParen)) {
                if let Some((err, offset)) = stream.lex_error() {
                    return Err(ParseError::new(err.to_string(), *offset));
                }
                return Err(ParseError::new("')' expected", stream.offset()));
            }
            stream.advance();
            Ok(inner)
        }
        Some(t) => Err(ParseError::new(
            format!("Unexpected initial {}", t),
            start,
        )),
        None => {
            if let Some((err, offset)) = stream.lex_error() {
                return Err(ParseError::new(err.to_string(), *offset));
            }
            Err(ParseError::new("Empty expression", start))
        }
    }
}

/// `fname ( name )`; for `anon`, the argument is a type tag and the child
/// is a synthesised integer leaf.
fn parse_func_call(stream: &mut TokenStream<'_>) -> Result<Expr, ParseError> {
    let start = stream.offset();
    let func_token = stream.advance().expect("caller checked function keyword");
    let fname = func_token
        .function_name()
        .expect("caller checked function keyword");
    stream.advance(); // `(`, guaranteed by caller lookahead

    let arg_at = stream.offset();
    let arg_name: Arc<str> = match stream.peek() {
        Some(Token::Name(s)) => {
            let s = s.clone();
            stream.advance();
            s
        }
        Some(t) if t.function_name().is_some() => {
            let s = Arc::from(t.function_name().unwrap());
            stream.advance();
            s
        }
        _ => {
            if let Some((err, offset)) = stream.lex_error() {
                return Err(ParseError::new(err.to_string(), *offset));
            }
            return Err(ParseError::new(
                format!("Metric name expected to follow {}(", fname),
                arg_at,
            ));
        }
    };
    let arg_span = Span::new(arg_at as u32, stream.prev_end() as u32);

    let (func, mut arg) = match func_token {
        Token::Avg => (Func::Avg, Expr::new(ExprKind::Name(arg_name), arg_span)),
        Token::Count => (Func::Count, Expr::new(ExprKind::Name(arg_name), arg_span)),
        Token::Delta => (Func::Delta, Expr::new(ExprKind::Name(arg_name), arg_span)),
        Token::Max => (Func::Max, Expr::new(ExprKind::Name(arg_name), arg_span)),
        Token::Min => (Func::Min, Expr::new(ExprKind::Name(arg_name), arg_span)),
        Token::Sum => (Func::Sum, Expr::new(ExprKind::Name(arg_name), arg_span)),
        Token::Rate => (Func::Rate, Expr::new(ExprKind::Name(arg_name), arg_span)),
        Token::Instant => (Func::Instant, Expr::new(ExprKind::Name(arg_name), arg_span)),
        Token::Anon => {
            let Some(vt) = anon_type_tag(&arg_name) else {
                return Err(ParseError::new("Illegal type for anon()", arg_at));
            };
            // The argument is a type tag, not a metric: synthesise an
            // integer leaf carrying the tagged type at bind time.
            let child = Expr::new(
                ExprKind::Integer {
                    text: Arc::from("0"),
                    value: 0,
                    units: Units::NONE,
                },
                arg_span,
            );
            (Func::Anon(vt), child)
        }
        _ => unreachable!("caller checked function keyword"),
    };

    if !matches!(stream.peek(), Some(Token::RParen)) {
        if let Some((err, offset)) = stream.lex_error() {
            return Err(ParseError::new(err.to_string(), *offset));
        }
        return Err(ParseError::new("')' expected", stream.offset()));
    }
    stream.advance();

    // The evaluator keeps the previous sample of every function argument.
    arg.save_last = true;

    Ok(Expr::new(
        ExprKind::Call {
            func,
            arg: Box::new(arg),
        },
        Span::new(start as u32, stream.prev_end() as u32),
    ))
}
