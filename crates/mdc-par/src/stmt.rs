//! Statement parsing.
//!
//! One parse routine per statement form, selected by the opening keyword.
//! Each routine reports what it can and leans on the shared recovery
//! helpers in the parser core rather than failing.

use mdc_lex::{Keyword, Punct, TokenKind};
use mdc_util::diagnostic::codes;

use crate::ast::{CallStmt, ExprStmt, IfStmt, ReturnStmt, SayStmt, SetStmt, Stmt};
use crate::expr::LOWEST;
use crate::Parser;

impl Parser<'_> {
    /// `Set `name` to EXPR.`
    pub(crate) fn parse_set(&mut self) -> Stmt {
        let token = self.bump();

        let name = match self.expect_ident("the variable in `Set`") {
            Some(name) => name,
            None => return self.recover_statement(token),
        };

        if !self.eat_kw(Keyword::To) {
            let found = self.peek(0);
            self.handler.error(
                codes::E_UNEXPECTED_TOKEN,
                format!("expected `to` after the variable, found `{}`", found.lexeme),
                found.span,
            );
            return self.recover_statement(token);
        }

        let value = self.parse_expression();
        self.expect_period();
        Stmt::Set(SetStmt { token, name, value })
    }

    /// `Give back EXPR.` — the expression is optional.
    pub(crate) fn parse_return(&mut self) -> Stmt {
        let token = self.bump();
        let value = if self.at_punct(Punct::Period) || self.at_eof() {
            None
        } else {
            Some(self.parse_expression())
        };
        self.expect_period();
        Stmt::Return(ReturnStmt { token, value })
    }

    /// `Say EXPR.`
    pub(crate) fn parse_say(&mut self) -> Stmt {
        let token = self.bump();
        let value = self.parse_expression();
        self.expect_period();
        Stmt::Say(SayStmt { token, value })
    }

    /// `Call `f` [with ARGS].` — `Use` and `Apply` are synonyms.
    pub(crate) fn parse_call_statement(&mut self) -> Stmt {
        let token = self.bump();
        let (callee, args) = self.parse_callee_and_args(token);
        self.expect_period();
        Stmt::Call(CallStmt {
            token,
            callee,
            args,
        })
    }

    /// `If EXPR [then][:] BLOCK [else[:] BLOCK]` — `When` and `Whenever`
    /// are synonyms for `If` in statement position.
    pub(crate) fn parse_if(&mut self) -> Stmt {
        let token = self.bump();
        let my_depth = self.depth;

        let condition = self.parse_expr(LOWEST);
        self.eat_kw(Keyword::Then);
        self.eat_punct(Punct::Colon);

        let consequence = self.parse_block(my_depth);

        // A bare `else` line belongs to a top-level `If`; nested ones find
        // theirs behind a block marker at their own depth.
        let bare_else = my_depth == 0
            && (self.eat_kw(Keyword::Else) || self.eat_kw(Keyword::Otherwise));
        let alternative = if bare_else {
            self.eat_punct(Punct::Colon);
            Some(self.parse_block(my_depth))
        } else if self.at_else_line(my_depth) {
            self.bump(); // the block marker
            self.bump(); // `else` / `otherwise`
            self.eat_punct(Punct::Colon);
            Some(self.parse_block(my_depth))
        } else {
            None
        };

        Stmt::If(IfStmt {
            token,
            condition,
            consequence,
            alternative,
        })
    }

    /// Whether the next line is this statement's `else` arm: a marker at the
    /// statement's own depth followed by `else`/`otherwise`.
    fn at_else_line(&mut self, my_depth: u8) -> bool {
        matches!(self.peek(0).kind, TokenKind::BlockMarker(d) if d == my_depth)
            && matches!(
                self.peek(1).kind,
                TokenKind::Keyword(Keyword::Else | Keyword::Otherwise)
            )
    }

    /// A bare expression as a statement.
    pub(crate) fn parse_expression_statement(&mut self) -> Stmt {
        let token = self.peek(0);
        let expr = self.parse_expression();
        self.expect_period();
        Stmt::Expr(ExprStmt { token, expr })
    }
}
