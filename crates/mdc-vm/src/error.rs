//! Runtime errors.
//!
//! A runtime error halts the current run and is not resumable. It carries
//! its kind, a message, the source position derived from the chunk's line
//! table, and the call chain at the point of failure (innermost first).

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    DivisionByZero,
    TypeMismatch,
    UnknownName,
    WrongArity,
    StackOverflow,
    StepLimit,
    InvalidBytecode,
}

impl fmt::Display for RuntimeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RuntimeErrorKind::DivisionByZero => "division by zero",
            RuntimeErrorKind::TypeMismatch => "type mismatch",
            RuntimeErrorKind::UnknownName => "unknown name",
            RuntimeErrorKind::WrongArity => "wrong number of arguments",
            RuntimeErrorKind::StackOverflow => "stack overflow",
            RuntimeErrorKind::StepLimit => "step limit exceeded",
            RuntimeErrorKind::InvalidBytecode => "invalid bytecode",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub message: String,
    /// 1-based source line, or 0 when no line info was recorded.
    pub line: u32,
    pub column: u32,
    /// Function names from innermost to outermost.
    pub call_chain: Vec<String>,
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if self.line != 0 {
            write!(f, " at {}:{}", self.line, self.column)?;
        }
        for name in &self.call_chain {
            write!(f, "\n  in `{name}`")?;
        }
        Ok(())
    }
}

impl std::error::Error for RuntimeError {}
