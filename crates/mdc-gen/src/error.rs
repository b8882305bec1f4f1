//! Code generation errors.
//!
//! These are hard limits of the chunk format, not user mistakes the
//! pipeline could recover from; the driver surfaces them as compile
//! failures.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodegenError {
    #[error("function `{name}` needs {needed} slots but a frame has at most {limit}")]
    TooManySlots {
        name: String,
        needed: usize,
        limit: usize,
    },
    #[error("function `{name}` has {count} parameters but the format allows 255")]
    TooManyParams { name: String, count: usize },
    #[error("constant pool overflow: {count} entries do not fit a 16-bit index")]
    TooManyConstants { count: usize },
    #[error("jump of {distance} bytes does not fit a signed 16-bit offset")]
    JumpTooFar { distance: i64 },
}
