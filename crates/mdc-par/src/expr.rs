//! Pratt expression parsing.
//!
//! Binding powers, lowest to highest: conditional (the mid-condition
//! ternary) < `or` < `and` < equality < relational < additive <
//! multiplicative < power < unary. Prefix position handles literals,
//! identifiers, `-`, `not`, grouping and call expressions; everything else
//! is table-driven on the infix token.

use mdc_lex::{Keyword, Lit, Op, Punct, Token, TokenKind};
use mdc_util::diagnostic::codes;
use rustc_hash::FxHashSet;

use crate::ast::{
    BinOp, BoolLit, CallArgs, CallExpr, ConditionalExpr, EmptyLit, ErrorExpr, Expr, FloatLit,
    GroupExpr, Ident, InfixExpr, IntLit, PrefixExpr, PrefixOp, StrLit, UrlLit,
};
use crate::Parser;

/// Binding powers. Zero never binds.
pub(crate) const LOWEST: u8 = 0;
const CONDITIONAL: u8 = 1;
const OR: u8 = 2;
const AND: u8 = 3;
const EQUALITY: u8 = 4;
const RELATIONAL: u8 = 5;
const ADDITIVE: u8 = 6;
const MULTIPLICATIVE: u8 = 7;
const POWER: u8 = 8;
const UNARY: u8 = 9;

/// The binding power of a token in infix position.
fn infix_power(kind: TokenKind) -> u8 {
    match kind {
        TokenKind::Keyword(Keyword::If | Keyword::When) => CONDITIONAL,
        TokenKind::Op(Op::Or) => OR,
        TokenKind::Op(Op::And) => AND,
        TokenKind::Op(Op::Eq | Op::NotEq | Op::StrictEq | Op::StrictNotEq) => EQUALITY,
        TokenKind::Op(Op::Lt | Op::Gt | Op::LtEq | Op::GtEq) => RELATIONAL,
        TokenKind::Op(Op::Plus | Op::Minus) => ADDITIVE,
        TokenKind::Op(Op::Star | Op::Slash | Op::Percent) => MULTIPLICATIVE,
        TokenKind::Op(Op::Caret) => POWER,
        _ => LOWEST,
    }
}

fn binop_for(op: Op) -> Option<BinOp> {
    let mapped = match op {
        Op::Plus => BinOp::Add,
        Op::Minus => BinOp::Sub,
        Op::Star => BinOp::Mul,
        Op::Slash => BinOp::Div,
        Op::Percent => BinOp::Mod,
        Op::Caret => BinOp::Pow,
        Op::Eq => BinOp::Eq,
        Op::NotEq => BinOp::NotEq,
        Op::StrictEq => BinOp::StrictEq,
        Op::StrictNotEq => BinOp::StrictNotEq,
        Op::Lt => BinOp::Lt,
        Op::Gt => BinOp::Gt,
        Op::LtEq => BinOp::LtEq,
        Op::GtEq => BinOp::GtEq,
        Op::And => BinOp::And,
        Op::Or => BinOp::Or,
        Op::Not => return None,
    };
    Some(mapped)
}

impl Parser<'_> {
    /// Parse an expression with the given minimum binding power.
    pub(crate) fn parse_expr(&mut self, min_power: u8) -> Expr {
        let mut left = self.parse_prefix();

        loop {
            let token = self.peek(0);
            let power = infix_power(token.kind);
            if power == LOWEST || power <= min_power {
                break;
            }
            left = self.parse_infix(left, token, power);
        }

        left
    }

    /// Convenience entry point with no binding restriction.
    pub(crate) fn parse_expression(&mut self) -> Expr {
        self.parse_expr(LOWEST)
    }

    fn parse_prefix(&mut self) -> Expr {
        let token = self.peek(0);
        match token.kind {
            TokenKind::Literal(Lit::Int(value)) => {
                self.bump();
                Expr::Int(IntLit { token, value })
            }
            TokenKind::Literal(Lit::Float(value)) => {
                self.bump();
                Expr::Float(FloatLit { token, value })
            }
            TokenKind::Literal(Lit::Str(value)) => {
                self.bump();
                Expr::Str(StrLit { token, value })
            }
            TokenKind::Literal(Lit::Url(value)) => {
                self.bump();
                Expr::Url(UrlLit { token, value })
            }
            TokenKind::Literal(Lit::Bool(value)) => {
                self.bump();
                Expr::Bool(BoolLit { token, value })
            }
            TokenKind::Literal(Lit::Empty) => {
                self.bump();
                Expr::Empty(EmptyLit { token })
            }
            TokenKind::Ident(name) => {
                self.bump();
                Expr::Ident(Ident { token, name })
            }
            TokenKind::Op(Op::Minus) => {
                self.bump();
                let operand = Box::new(self.parse_expr(UNARY));
                Expr::Prefix(PrefixExpr {
                    token,
                    op: PrefixOp::Neg,
                    operand,
                })
            }
            TokenKind::Op(Op::Not) => {
                self.bump();
                let operand = Box::new(self.parse_expr(UNARY));
                Expr::Prefix(PrefixExpr {
                    token,
                    op: PrefixOp::Not,
                    operand,
                })
            }
            TokenKind::Punct(Punct::LParen) => {
                self.bump();
                let inner = self.parse_expression();
                if !self.eat_punct(Punct::RParen) {
                    let found = self.peek(0);
                    self.handler.error(
                        codes::E_UNEXPECTED_TOKEN,
                        format!("expected `)` but found `{}`", found.lexeme),
                        found.span,
                    );
                }
                Expr::Group(Box::new(GroupExpr { token, inner }))
            }
            TokenKind::Keyword(Keyword::Call | Keyword::Use | Keyword::Apply) => {
                self.bump();
                let (callee, args) = self.parse_callee_and_args(token);
                Expr::Call(Box::new(CallExpr {
                    token,
                    callee,
                    args,
                }))
            }
            _ => {
                self.handler.error(
                    codes::E_EXPECTED_EXPRESSION,
                    format!("expected an expression but found `{}`", token.lexeme),
                    token.span,
                );
                Expr::Error(ErrorExpr { token })
            }
        }
    }

    fn parse_infix(&mut self, left: Expr, token: Token, power: u8) -> Expr {
        match token.kind {
            // `THEN if COND else ELSE` / `THEN when COND otherwise ELSE`.
            TokenKind::Keyword(Keyword::If | Keyword::When) => {
                self.bump();
                let condition = self.parse_expr(CONDITIONAL);
                if !self.eat_kw(Keyword::Else) && !self.eat_kw(Keyword::Otherwise) {
                    let found = self.peek(0);
                    self.handler.error(
                        codes::E_UNEXPECTED_TOKEN,
                        format!(
                            "expected `else` or `otherwise` in conditional expression, found `{}`",
                            found.lexeme
                        ),
                        found.span,
                    );
                }
                // Right-associative: a nested conditional binds the tail.
                let else_value = self.parse_expr(CONDITIONAL - 1);
                Expr::Conditional(Box::new(ConditionalExpr {
                    token,
                    then_value: left,
                    condition,
                    else_value,
                }))
            }
            TokenKind::Op(op) => {
                self.bump();
                let binop = binop_for(op).expect("infix_power admits only binary ops");
                // `^` is right-associative; everything else associates left.
                let next_power = if op == Op::Caret { power - 1 } else { power };
                let right = self.parse_expr(next_power);
                Expr::Infix(InfixExpr {
                    token,
                    op: binop,
                    left: Box::new(left),
                    right: Box::new(right),
                })
            }
            _ => unreachable!("infix_power admitted a non-infix token"),
        }
    }

    /// Parse `` `callee` [with ARGS] `` after a call keyword.
    pub(crate) fn parse_callee_and_args(&mut self, call_token: Token) -> (Ident, CallArgs) {
        let callee = self.expect_ident("the called name").unwrap_or(Ident {
            token: call_token,
            name: call_token.lexeme,
        });

        let mut args = CallArgs::default();
        if !self.eat_kw(Keyword::With) {
            return (callee, args);
        }

        let mut seen_names: FxHashSet<&'static str> = FxHashSet::default();
        loop {
            // `name: value` named argument, or a positional expression.
            let is_named = matches!(self.peek(0).kind, TokenKind::Ident(_))
                && self.peek(1).kind == TokenKind::Punct(Punct::Colon);
            if is_named {
                let name_token = self.bump();
                let name = match name_token.kind {
                    TokenKind::Ident(name) => name,
                    _ => unreachable!(),
                };
                self.bump(); // `:`
                let value = self.parse_expression();
                if !seen_names.insert(name.as_str()) {
                    self.handler.error(
                        codes::E_DUPLICATE_NAMED_ARG,
                        format!("named argument `{name}` given more than once"),
                        name_token.span,
                    );
                }
                args.named.push((
                    Ident {
                        token: name_token,
                        name,
                    },
                    value,
                ));
            } else {
                let value = self.parse_expression();
                if !args.named.is_empty() {
                    self.handler.error(
                        codes::E_POSITIONAL_AFTER_NAMED,
                        "positional arguments must precede named arguments",
                        value.span(),
                    );
                }
                args.positional.push(value);
            }

            if !self.eat_punct(Punct::Comma) {
                break;
            }
        }

        (callee, args)
    }
}
