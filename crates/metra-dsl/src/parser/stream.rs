//! Token stream wrapper for the hand-written parser.

use crate::lexer::{LexError, Token};
use logos::Logos;
use std::ops::Range;

/// Token stream with lookahead and byte-offset tracking.
///
/// The stream lexes the whole source up front but stops at the first
/// lexical error, recording it instead of the remaining tokens. The parser
/// therefore only reports the error when it actually reaches that point,
/// matching token-at-a-time lexing behaviour.
pub struct TokenStream<'src> {
    source: &'src str,
    tokens: Vec<(Token, Range<usize>)>,
    pos: usize,
    prev_end: usize,
    lex_error: Option<(LexError, usize)>,
}

impl<'src> TokenStream<'src> {
    /// Lex a source string into a stream.
    pub fn new(source: &'src str) -> TokenStream<'src> {
        let mut tokens = Vec::new();
        let mut lex_error = None;
        let mut lexer = Token::lexer(source);
        while let Some(result) = lexer.next() {
            match result {
                Ok(token) => tokens.push((token, lexer.span())),
                Err(err) => {
                    lex_error = Some((err, lexer.span().start));
                    break;
                }
            }
        }
        TokenStream {
            source,
            tokens,
            pos: 0,
            prev_end: 0,
            lex_error,
        }
    }

    /// Peek at the current token without consuming it.
    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    /// Peek at the nth token ahead without consuming.
    pub fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n).map(|(t, _)| t)
    }

    /// Advance past the current token and return it.
    pub fn advance(&mut self) -> Option<Token> {
        let (token, span) = self.tokens.get(self.pos).cloned()?;
        self.pos += 1;
        self.prev_end = span.end;
        Some(token)
    }

    /// Source text of the current token.
    pub fn current_text(&self) -> Option<&'src str> {
        self.tokens
            .get(self.pos)
            .map(|(_, span)| &self.source[span.clone()])
    }

    /// Byte offset where the current token starts (source length at EOS).
    pub fn offset(&self) -> usize {
        match self.tokens.get(self.pos) {
            Some((_, span)) => span.start,
            None => match &self.lex_error {
                Some((_, offset)) => *offset,
                None => self.prev_end,
            },
        }
    }

    /// Byte offset one past the most recently consumed token.
    pub fn prev_end(&self) -> usize {
        self.prev_end
    }

    /// Whether the next token starts immediately after the current one,
    /// with no intervening whitespace.
    pub fn next_adjacent(&self) -> bool {
        match (self.tokens.get(self.pos), self.tokens.get(self.pos + 1)) {
            (Some((_, a)), Some((_, b))) => a.end == b.start,
            _ => false,
        }
    }

    /// Whether all tokens have been consumed (a pending lexical error still
    /// counts as remaining input).
    pub fn at_end(&self) -> bool {
        self.pos >= self.tokens.len() && self.lex_error.is_none()
    }

    /// The deferred lexical error, once the tokens before it are consumed.
    pub fn lex_error(&self) -> Option<&(LexError, usize)> {
        if self.pos >= self.tokens.len() {
            self.lex_error.as_ref()
        } else {
            None
        }
    }
}
