//! Command implementations. Each `execute` returns the process exit code
//! for handled failures (compile and runtime errors are printed, not
//! bubbled); only I/O-category problems surface as [`crate::error::MdtError`].

pub mod compile;
pub mod disasm;
pub mod run;
pub mod shell;

use std::path::Path;

use crate::error::{MdtError, Result};

/// Read a file with the path attached to any failure.
pub fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| MdtError::File {
        path: path.display().to_string(),
        source,
    })
}

pub fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| MdtError::File {
        path: path.display().to_string(),
        source,
    })
}

pub fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes).map_err(|source| MdtError::File {
        path: path.display().to_string(),
        source,
    })
}

/// Decode a module file.
pub fn load_module(path: &Path) -> Result<mdc_bc::Module> {
    let bytes = read_file(path)?;
    mdc_bc::Module::decode(&bytes).map_err(|err| MdtError::BadModule {
        path: path.display().to_string(),
        message: err.to_string(),
    })
}
