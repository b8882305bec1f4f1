//! Error and warning reporting infrastructure.
//!
//! Compile-time problems are not `Err` returns: every phase keeps going after
//! a failure (the lexer emits illegal tokens, the parser resynchronises) and
//! records what went wrong through a shared [`Handler`]. Code generation
//! refuses to start while the handler holds any error.
//!
//! # Examples
//!
//! ```
//! use mdc_util::{Handler, Span};
//! use mdc_util::diagnostic::codes;
//!
//! let handler = Handler::new();
//! handler.error(codes::E_UNEXPECTED_TOKEN, "unexpected token", Span::DUMMY);
//!
//! assert!(handler.has_errors());
//! assert_eq!(handler.error_count(), 1);
//! ```

pub mod codes;

pub use codes::DiagnosticCode;

use crate::span::Span;
use rustc_hash::FxHashSet;
use std::cell::RefCell;
use std::fmt;

/// Diagnostic severity level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    /// An error that prevents code generation.
    Error,
    /// A warning that does not prevent code generation.
    Warning,
    /// Additional information attached to another diagnostic.
    Note,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Error => write!(f, "error"),
            Level::Warning => write!(f, "warning"),
            Level::Note => write!(f, "note"),
        }
    }
}

/// A single diagnostic message with severity, code and location.
#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    /// Severity level.
    pub level: Level,
    /// Categorising code (`E1001` and friends).
    pub code: DiagnosticCode,
    /// Main message.
    pub message: String,
    /// Source location the message points at.
    pub span: Span,
}

impl Diagnostic {
    /// Create a new diagnostic.
    pub fn new(level: Level, code: DiagnosticCode, message: impl Into<String>, span: Span) -> Self {
        Self {
            level,
            code,
            message: message.into(),
            span,
        }
    }

    /// Create an error diagnostic.
    pub fn error(code: DiagnosticCode, message: impl Into<String>, span: Span) -> Self {
        Self::new(Level::Error, code, message, span)
    }

    /// Create a warning diagnostic.
    pub fn warning(code: DiagnosticCode, message: impl Into<String>, span: Span) -> Self {
        Self::new(Level::Warning, code, message, span)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}]: {} at {}",
            self.level, self.code, self.message, self.span
        )
    }
}

/// Collector for diagnostics emitted across compiler phases.
///
/// Diagnostics come out in emission order; emitting the same (code, span,
/// message) twice records it once. Interior mutability lets phases that only
/// hold a shared reference report problems.
pub struct Handler {
    diagnostics: RefCell<Vec<Diagnostic>>,
    seen: RefCell<FxHashSet<(u16, u32, u32, String)>>,
}

impl Handler {
    /// Create a new, empty handler.
    pub fn new() -> Self {
        Self {
            diagnostics: RefCell::new(Vec::new()),
            seen: RefCell::new(FxHashSet::default()),
        }
    }

    /// Report an error.
    pub fn error(&self, code: DiagnosticCode, message: impl Into<String>, span: Span) {
        self.emit(Diagnostic::error(code, message, span));
    }

    /// Report a warning.
    pub fn warning(&self, code: DiagnosticCode, message: impl Into<String>, span: Span) {
        self.emit(Diagnostic::warning(code, message, span));
    }

    /// Record a diagnostic, dropping exact duplicates.
    pub fn emit(&self, diagnostic: Diagnostic) {
        let key = (
            diagnostic.code.number,
            diagnostic.span.line,
            diagnostic.span.column,
            diagnostic.message.clone(),
        );
        if self.seen.borrow_mut().insert(key) {
            self.diagnostics.borrow_mut().push(diagnostic);
        }
    }

    /// Whether any error-level diagnostic has been reported.
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .borrow()
            .iter()
            .any(|d| d.level == Level::Error)
    }

    /// Number of error-level diagnostics.
    pub fn error_count(&self) -> usize {
        self.diagnostics
            .borrow()
            .iter()
            .filter(|d| d.level == Level::Error)
            .count()
    }

    /// Number of warning-level diagnostics.
    pub fn warning_count(&self) -> usize {
        self.diagnostics
            .borrow()
            .iter()
            .filter(|d| d.level == Level::Warning)
            .count()
    }

    /// Snapshot of all diagnostics in emission order.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.borrow().clone()
    }

    /// Move all diagnostics out of the handler.
    pub fn take(&self) -> Vec<Diagnostic> {
        self.seen.borrow_mut().clear();
        std::mem::take(&mut *self.diagnostics.borrow_mut())
    }
}

impl Default for Handler {
    fn default() -> Self {
        Self::new()
    }
}
