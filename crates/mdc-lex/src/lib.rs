//! mdc-lex - Lexical analysis for Machine Dialect.
//!
//! Machine Dialect source is prose-like Markdown: literals sit between
//! underscores, identifiers between backticks, keywords may be bolded, and
//! most operators are English phrases. This crate turns a source buffer into
//! a stream of [`Token`]s:
//!
//! ```
//! use mdc_lex::{tokenize, TokenKind, Keyword};
//! use mdc_util::Handler;
//!
//! let handler = Handler::new();
//! let tokens = tokenize("Set `x` to _42_.", &handler);
//!
//! assert_eq!(tokens[0].kind, TokenKind::Keyword(Keyword::Set));
//! assert!(!handler.has_errors());
//! ```
//!
//! Lexing never fails: unrecognised input becomes [`TokenKind::Illegal`]
//! tokens with diagnostics on the [`Handler`](mdc_util::Handler), and the
//! stream always ends with [`TokenKind::Eof`].

pub mod cursor;
pub mod lexer;
pub mod phrase;
pub mod stream;
pub mod token;

pub use lexer::{tokenize, Frontmatter, Lexer};
pub use stream::{TokenStream, LOOKAHEAD};
pub use token::{Keyword, Lit, Op, Punct, Token, TokenKind};
