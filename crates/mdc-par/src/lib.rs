//! mdc-par - Parsing for Machine Dialect.
//!
//! A hybrid parser: recursive descent for statements, Pratt
//! (precedence-climbing) for expressions. The parser consumes the lexer's
//! token stream through a small lookahead buffer, skipping stopword tokens
//! as it refills.
//!
//! Errors never abort the parse. On an unexpected token the parser enters
//! panic mode: it collects tokens up to the next synchronisation point (a
//! period, end of input, or a statement-starting keyword), records an
//! [`ast::ErrorStmt`] carrying the skipped tokens, and keeps going. A bound
//! on the number of recoveries guards against pathological inputs.
//!
//! ```
//! use mdc_par::parse;
//! use mdc_util::Handler;
//!
//! let handler = Handler::new();
//! let program = parse("Set `x` to _2_ + _3_ * _4_.", &handler);
//! assert!(!handler.has_errors());
//! assert_eq!(program.statements.len(), 1);
//! ```

pub mod ast;
mod expr;
mod items;
mod stmt;

#[cfg(test)]
mod tests;

use std::collections::VecDeque;

use mdc_lex::{Frontmatter, Keyword, Punct, Token, TokenKind, TokenStream};
use mdc_util::diagnostic::codes;
use mdc_util::Handler;

use ast::{ErrorStmt, Program, Stmt};

/// Maximum panic-mode recoveries before the parser gives up on the rest of
/// the input.
const MAX_RECOVERIES: usize = 20;

/// Parse a source string into a [`Program`], reporting diagnostics to
/// `handler`.
pub fn parse(source: &str, handler: &Handler) -> Program {
    let stream = TokenStream::new(source, handler);
    Parser::new(stream, handler).parse_program()
}

/// The statement parser. Expression parsing lives in [`expr`], statement
/// forms in [`stmt`], method definitions in [`items`].
pub struct Parser<'a> {
    stream: TokenStream<'a>,
    handler: &'a Handler,
    /// Lookahead buffer over the stream, stopwords already dropped.
    buffer: VecDeque<Token>,
    /// Depth of the block whose statements are currently being parsed.
    depth: u8,
    /// Panic-mode recoveries so far.
    recoveries: usize,
    /// Set when the recovery limit is hit; the parser then drains to EOF.
    gave_up: bool,
}

impl<'a> Parser<'a> {
    pub fn new(stream: TokenStream<'a>, handler: &'a Handler) -> Self {
        Self {
            stream,
            handler,
            buffer: VecDeque::new(),
            depth: 0,
            recoveries: 0,
            gave_up: false,
        }
    }

    /// The frontmatter flags the lexer scanned.
    pub fn frontmatter(&self) -> Frontmatter {
        self.stream.frontmatter()
    }

    /// Parse the whole input.
    pub fn parse_program(mut self) -> Program {
        let mut program = Program::default();
        loop {
            self.skip_comments();
            if self.at_eof() || self.gave_up {
                break;
            }
            let stmt = self.parse_statement();
            program.statements.push(stmt);
        }
        program
    }

    // Token plumbing ------------------------------------------------------

    fn fill(&mut self, k: usize) {
        while self.buffer.len() <= k {
            let token = self.stream.next();
            // Stopwords are lexed but carry no grammar; drop them here.
            if matches!(token.kind, TokenKind::Stopword(_)) {
                continue;
            }
            self.buffer.push_back(token);
        }
    }

    pub(crate) fn peek(&mut self, k: usize) -> Token {
        self.fill(k);
        self.buffer[k]
    }

    pub(crate) fn bump(&mut self) -> Token {
        self.fill(0);
        self.buffer.pop_front().expect("fill guarantees a token")
    }

    pub(crate) fn at_eof(&mut self) -> bool {
        self.peek(0).is_eof()
    }

    pub(crate) fn at_kw(&mut self, kw: Keyword) -> bool {
        self.peek(0).kind == TokenKind::Keyword(kw)
    }

    pub(crate) fn at_punct(&mut self, punct: Punct) -> bool {
        self.peek(0).kind == TokenKind::Punct(punct)
    }

    pub(crate) fn eat_kw(&mut self, kw: Keyword) -> bool {
        if self.at_kw(kw) {
            self.bump();
            true
        } else {
            false
        }
    }

    pub(crate) fn eat_punct(&mut self, punct: Punct) -> bool {
        if self.at_punct(punct) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn skip_comments(&mut self) {
        while matches!(self.peek(0).kind, TokenKind::Comment(_)) {
            self.bump();
        }
    }

    // Statements ----------------------------------------------------------

    pub(crate) fn parse_statement(&mut self) -> Stmt {
        let token = self.peek(0);
        let starts_expr = self.starts_expression();
        match token.kind {
            TokenKind::Keyword(Keyword::Set) => self.parse_set(),
            TokenKind::Keyword(Keyword::GiveBack) => self.parse_return(),
            TokenKind::Keyword(Keyword::If | Keyword::When | Keyword::Whenever) => {
                self.parse_if()
            }
            TokenKind::Keyword(Keyword::Call | Keyword::Use | Keyword::Apply) => {
                self.parse_call_statement()
            }
            TokenKind::Keyword(Keyword::Say) => self.parse_say(),
            TokenKind::Punct(Punct::Header(3)) => self.parse_method(),
            TokenKind::BlockMarker(depth) => {
                self.handler.error(
                    codes::E_BLOCK_DEPTH,
                    format!(
                        "unexpected block marker of depth {depth} outside a block"
                    ),
                    token.span,
                );
                self.bump();
                self.recover_statement(token)
            }
            _ if starts_expr => self.parse_expression_statement(),
            _ => {
                self.handler.error(
                    codes::E_UNEXPECTED_TOKEN,
                    format!("unexpected token `{}`", token.lexeme),
                    token.span,
                );
                self.recover_statement(token)
            }
        }
    }

    /// Whether the current token can begin an expression.
    pub(crate) fn starts_expression(&mut self) -> bool {
        matches!(
            self.peek(0).kind,
            TokenKind::Literal(_)
                | TokenKind::Ident(_)
                | TokenKind::Op(mdc_lex::Op::Minus | mdc_lex::Op::Not)
                | TokenKind::Punct(Punct::LParen)
                | TokenKind::Keyword(Keyword::Call | Keyword::Use | Keyword::Apply)
        )
    }

    // Blocks --------------------------------------------------------------

    /// Parse a `>`-marked block whose lines must be strictly deeper than
    /// `parent_depth`. The block's own depth is fixed by its first line;
    /// the block ends at the first line at or above the parent depth.
    pub(crate) fn parse_block(&mut self, parent_depth: u8) -> ast::Block {
        let token = self.peek(0);
        let block_depth = match token.kind {
            TokenKind::BlockMarker(d) if d > parent_depth => d,
            TokenKind::BlockMarker(d) => {
                self.handler.error(
                    codes::E_BLOCK_DEPTH,
                    format!(
                        "block line has depth {d} but must be deeper than {parent_depth}"
                    ),
                    token.span,
                );
                return ast::Block {
                    token,
                    depth: parent_depth.saturating_add(1),
                    statements: Vec::new(),
                };
            }
            _ => {
                self.handler.error(
                    codes::E_BLOCK_DEPTH,
                    "expected an indented block".to_string(),
                    token.span,
                );
                return ast::Block {
                    token,
                    depth: parent_depth.saturating_add(1),
                    statements: Vec::new(),
                };
            }
        };

        let mut statements = Vec::new();
        loop {
            self.skip_comments();
            match self.peek(0).kind {
                TokenKind::BlockMarker(d) if d == block_depth => {
                    let marker = self.bump();
                    self.skip_comments();
                    let saved = self.depth;
                    self.depth = block_depth;
                    // A marker line with nothing after it ends the input.
                    if self.at_eof() {
                        self.depth = saved;
                        break;
                    }
                    if matches!(self.peek(0).kind, TokenKind::BlockMarker(_)) {
                        self.handler.error(
                            codes::E_BLOCK_DEPTH,
                            "stray block marker",
                            marker.span,
                        );
                        self.depth = saved;
                        continue;
                    }
                    let stmt = self.parse_statement();
                    self.depth = saved;
                    statements.push(stmt);
                }
                TokenKind::BlockMarker(d) if d > block_depth => {
                    let marker = self.bump();
                    self.handler.error(
                        codes::E_BLOCK_DEPTH,
                        format!(
                            "line depth {d} does not match enclosing block depth {block_depth}"
                        ),
                        marker.span,
                    );
                    let errored = self.recover_statement(marker);
                    statements.push(errored);
                }
                _ => break,
            }
        }

        ast::Block {
            token,
            depth: block_depth,
            statements,
        }
    }

    // Error recovery ------------------------------------------------------

    /// Panic-mode recovery: collect tokens until a synchronisation point
    /// (period, EOF, statement-starting keyword, or a method header) and
    /// produce an error statement carrying them.
    pub(crate) fn recover_statement(&mut self, start: Token) -> Stmt {
        self.recoveries += 1;
        let mut skipped = Vec::new();

        if self.recoveries >= MAX_RECOVERIES {
            if !self.gave_up {
                self.handler.error(
                    codes::E_RECOVERY_LIMIT,
                    format!("too many parse errors ({MAX_RECOVERIES}); giving up"),
                    start.span,
                );
                self.gave_up = true;
            }
            while !self.at_eof() {
                skipped.push(self.bump());
            }
            return Stmt::Error(ErrorStmt {
                token: start,
                skipped,
            });
        }

        loop {
            let token = self.peek(0);
            match token.kind {
                TokenKind::Eof => break,
                TokenKind::Punct(Punct::Period) => {
                    skipped.push(self.bump());
                    break;
                }
                TokenKind::Punct(Punct::Header(3)) => break,
                TokenKind::Keyword(kw) if kw.starts_statement() => break,
                _ => skipped.push(self.bump()),
            }
        }

        Stmt::Error(ErrorStmt {
            token: start,
            skipped,
        })
    }

    /// Consume the statement terminator. A period is mandatory except at
    /// end of input; a missing one is reported and the parser resynchronises.
    pub(crate) fn expect_period(&mut self) {
        if self.eat_punct(Punct::Period) || self.at_eof() {
            return;
        }
        // Block and section boundaries also end a statement cleanly.
        if matches!(
            self.peek(0).kind,
            TokenKind::BlockMarker(_)
                | TokenKind::Punct(Punct::DetailsClose | Punct::Header(_))
        ) {
            let token = self.peek(0);
            self.handler.error(
                codes::E_MISSING_TERMINATOR,
                "missing `.` at end of statement",
                token.span,
            );
            return;
        }
        let token = self.peek(0);
        self.handler.error(
            codes::E_MISSING_TERMINATOR,
            format!("expected `.` but found `{}`", token.lexeme),
            token.span,
        );
        // Skip to the next sync point so one mistake costs one diagnostic.
        loop {
            let token = self.peek(0);
            match token.kind {
                TokenKind::Eof => break,
                TokenKind::Punct(Punct::Period) => {
                    self.bump();
                    break;
                }
                TokenKind::Keyword(kw) if kw.starts_statement() => break,
                TokenKind::BlockMarker(_) => break,
                _ => {
                    self.bump();
                }
            }
        }
    }

    /// Expect a backtick-wrapped identifier.
    pub(crate) fn expect_ident(&mut self, context: &str) -> Option<ast::Ident> {
        let token = self.peek(0);
        match token.kind {
            TokenKind::Ident(name) => {
                self.bump();
                if !token.lexeme.as_str().starts_with('`') {
                    self.handler.error(
                        codes::E_UNEXPECTED_TOKEN,
                        format!("{context} must be wrapped in backticks"),
                        token.span,
                    );
                }
                Some(ast::Ident { token, name })
            }
            _ => {
                self.handler.error(
                    codes::E_UNEXPECTED_TOKEN,
                    format!("expected {context} but found `{}`", token.lexeme),
                    token.span,
                );
                None
            }
        }
    }
}
