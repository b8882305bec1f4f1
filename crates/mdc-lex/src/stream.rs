//! Buffered token stream with fixed lookahead.
//!
//! The parser drives the lexer through this pull interface: `next()`
//! consumes one token, `peek(k)` looks up to [`LOOKAHEAD`] tokens ahead
//! without consuming. The buffer only holds what peeking demanded, so the
//! lexer stays streaming.

use std::collections::VecDeque;

use mdc_util::Handler;

use crate::lexer::{Frontmatter, Lexer};
use crate::token::Token;

/// Number of tokens of lookahead the stream guarantees.
pub const LOOKAHEAD: usize = 4;

/// A buffered stream of tokens over a [`Lexer`].
pub struct TokenStream<'a> {
    lexer: Lexer<'a>,
    buffer: VecDeque<Token>,
}

impl<'a> TokenStream<'a> {
    /// Create a stream lexing `source`, reporting problems to `handler`.
    pub fn new(source: &'a str, handler: &'a Handler) -> Self {
        Self {
            lexer: Lexer::new(source, handler),
            buffer: VecDeque::with_capacity(LOOKAHEAD),
        }
    }

    /// The frontmatter flags scanned ahead of the first token.
    pub fn frontmatter(&self) -> Frontmatter {
        self.lexer.frontmatter()
    }

    /// Consume and return the next token. Returns `Eof` forever at the end.
    pub fn next(&mut self) -> Token {
        self.fill(0);
        self.buffer.pop_front().expect("fill guarantees one token")
    }

    /// Look at the token `k` positions ahead without consuming, `k = 0`
    /// being the next token. `k` must be below [`LOOKAHEAD`].
    pub fn peek(&mut self, k: usize) -> &Token {
        debug_assert!(k < LOOKAHEAD, "lookahead beyond {LOOKAHEAD} tokens");
        self.fill(k);
        &self.buffer[k]
    }

    fn fill(&mut self, k: usize) {
        while self.buffer.len() <= k {
            let token = self.lexer.next_token();
            self.buffer.push_back(token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{Keyword, TokenKind};

    #[test]
    fn test_next_and_peek_agree() {
        let handler = Handler::new();
        let mut stream = TokenStream::new("Set `x` to _1_.", &handler);

        let peeked = *stream.peek(0);
        let next = stream.next();
        assert_eq!(peeked, next);
        assert_eq!(next.kind, TokenKind::Keyword(Keyword::Set));
    }

    #[test]
    fn test_peek_does_not_consume() {
        let handler = Handler::new();
        let mut stream = TokenStream::new("give back `x`.", &handler);

        assert_eq!(stream.peek(0).kind, TokenKind::Keyword(Keyword::GiveBack));
        assert_eq!(stream.peek(0).kind, TokenKind::Keyword(Keyword::GiveBack));
        let _ = stream.next();
        assert!(matches!(stream.peek(0).kind, TokenKind::Ident(_)));
    }

    #[test]
    fn test_peek_ahead() {
        let handler = Handler::new();
        let mut stream = TokenStream::new("Set `x` to _1_.", &handler);

        assert!(matches!(stream.peek(1).kind, TokenKind::Ident(_)));
        assert_eq!(stream.peek(2).kind, TokenKind::Keyword(Keyword::To));
        // Peeking did not disturb the front of the stream.
        assert_eq!(stream.next().kind, TokenKind::Keyword(Keyword::Set));
    }

    #[test]
    fn test_eof_is_sticky() {
        let handler = Handler::new();
        let mut stream = TokenStream::new("", &handler);
        assert_eq!(stream.next().kind, TokenKind::Eof);
        assert_eq!(stream.next().kind, TokenKind::Eof);
    }
}
