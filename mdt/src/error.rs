//! Error handling for the mdt CLI.
//!
//! Compile and runtime failures are reported by the commands themselves
//! and mapped to exit codes 1 and 2; `MdtError` covers everything else
//! (I/O, configuration, malformed modules), which exits with code 3.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MdtError {
    /// Configuration file problems.
    #[error("configuration error: {0}")]
    Config(String),

    /// Reading or writing a file failed.
    #[error("{path}: {source}")]
    File {
        path: String,
        source: std::io::Error,
    },

    /// A module file did not decode.
    #[error("{path}: {message}")]
    BadModule { path: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MdtError {
    /// All `MdtError`s are I/O-category failures.
    pub fn exit_code(&self) -> i32 {
        mdc_drv::exit_codes::IO_ERROR
    }
}

pub type Result<T> = std::result::Result<T, MdtError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = MdtError::Config("bad value".to_string());
        assert_eq!(err.to_string(), "configuration error: bad value");
    }

    #[test]
    fn test_exit_code_is_io() {
        let err = MdtError::Config("x".to_string());
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: MdtError = io.into();
        assert!(matches!(err, MdtError::Io(_)));
    }
}
