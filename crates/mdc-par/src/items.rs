//! Method definition parsing.
//!
//! An `Action` (private) or `Interaction` (public) is introduced by a
//! Markdown header and holds its body in a `<details>` block:
//!
//! ```text
//! ### **Action**: `fib`
//! <details>
//! <summary>n-th Fibonacci number.</summary>
//! #### Inputs
//! - `n` as Whole Number
//! #### Outputs
//! - Whole Number
//! If `n` is less than _2_ then:
//! > give back `n`.
//! give back (call `fib` with `n` - _1_) + (call `fib` with `n` - _2_).
//! </details>
//! ```

use mdc_lex::{Keyword, Op, Punct, TokenKind};
use mdc_util::diagnostic::codes;

use crate::ast::{Block, MethodDef, Param, Stmt, TypeName, Visibility};
use crate::Parser;

impl Parser<'_> {
    /// Parse a method definition starting at its `###` header.
    pub(crate) fn parse_method(&mut self) -> Stmt {
        let token = self.bump(); // `###`

        let visibility = if self.eat_kw(Keyword::Action) {
            Visibility::Private
        } else if self.eat_kw(Keyword::Interaction) {
            Visibility::Public
        } else {
            let found = self.peek(0);
            self.handler.error(
                codes::E_UNEXPECTED_TOKEN,
                format!(
                    "expected `Action` or `Interaction` after `###`, found `{}`",
                    found.lexeme
                ),
                found.span,
            );
            return self.recover_statement(token);
        };

        if !self.eat_punct(Punct::Colon) {
            let found = self.peek(0);
            self.handler.error(
                codes::E_UNEXPECTED_TOKEN,
                format!("expected `:` before the method name, found `{}`", found.lexeme),
                found.span,
            );
        }

        let name = match self.expect_ident("the method name") {
            Some(name) => name,
            None => return self.recover_statement(token),
        };

        if !self.eat_punct(Punct::DetailsOpen) {
            let found = self.peek(0);
            self.handler.error(
                codes::E_UNEXPECTED_TOKEN,
                format!(
                    "expected `<details>` to open the body of `{}`",
                    name.name
                ),
                found.span,
            );
            return self.recover_statement(token);
        }

        let doc = match self.peek(0).kind {
            TokenKind::Comment(text) => {
                self.bump();
                Some(text)
            }
            _ => None,
        };

        let params = self.parse_inputs_section();
        let output = self.parse_outputs_section();

        let body_token = self.peek(0);
        let mut statements = Vec::new();
        loop {
            if self.at_punct(Punct::DetailsClose) {
                self.bump();
                break;
            }
            if self.at_eof() {
                self.handler.error(
                    codes::E_UNEXPECTED_TOKEN,
                    format!("`</details>` missing for `{}`", name.name),
                    body_token.span,
                );
                break;
            }
            if matches!(self.peek(0).kind, TokenKind::Comment(_)) {
                self.bump();
                continue;
            }
            statements.push(self.parse_statement());
        }

        let def = MethodDef {
            token,
            name,
            visibility,
            doc,
            params,
            output,
            body: Block {
                token: body_token,
                depth: 0,
                statements,
            },
        };
        match visibility {
            Visibility::Private => Stmt::Action(def),
            Visibility::Public => Stmt::Interaction(def),
        }
    }

    /// `#### Inputs` followed by `- `name` [as TYPE]` bullets.
    fn parse_inputs_section(&mut self) -> Vec<Param> {
        if !self.at_section_header(Keyword::Inputs) {
            return Vec::new();
        }
        self.bump(); // `####`
        self.bump(); // `Inputs`

        let mut params = Vec::new();
        while self.peek(0).kind == TokenKind::Op(Op::Minus) {
            self.bump();
            let Some(name) = self.expect_ident("the parameter name") else {
                break;
            };
            let ty = if self.eat_kw(Keyword::As) {
                self.parse_type_name()
            } else {
                None
            };
            params.push(Param { name, ty });
        }
        params
    }

    /// `#### Outputs` followed by a single `- TYPE` bullet.
    fn parse_outputs_section(&mut self) -> Option<TypeName> {
        if !self.at_section_header(Keyword::Outputs) {
            return None;
        }
        self.bump(); // `####`
        self.bump(); // `Outputs`

        if self.peek(0).kind == TokenKind::Op(Op::Minus) {
            self.bump();
        }
        self.parse_type_name()
    }

    fn at_section_header(&mut self, kw: Keyword) -> bool {
        self.peek(0).kind == TokenKind::Punct(Punct::Header(4))
            && self.peek(1).kind == TokenKind::Keyword(kw)
    }

    /// A surface type name: one or two words, with `Yes/No` allowing a
    /// slash between them.
    fn parse_type_name(&mut self) -> Option<TypeName> {
        let first = self.peek(0);
        let mut words: Vec<String> = Vec::new();
        while words.len() < 2 {
            match self.peek(0).kind {
                TokenKind::Ident(word) => {
                    self.bump();
                    words.push(word.as_str().to_ascii_lowercase());
                }
                TokenKind::Op(Op::Slash) if words.len() == 1 => {
                    self.bump();
                }
                _ => break,
            }
        }

        if words.is_empty() {
            self.handler.error(
                codes::E_UNKNOWN_TYPE_NAME,
                "expected a type name",
                first.span,
            );
            return None;
        }

        let refs: Vec<&str> = words.iter().map(|w| w.as_str()).collect();
        let ty = TypeName::from_words(&refs);
        if ty.is_none() {
            self.handler.error(
                codes::E_UNKNOWN_TYPE_NAME,
                format!("unknown type name `{}`", words.join(" ")),
                first.span,
            );
        }
        ty
    }
}
