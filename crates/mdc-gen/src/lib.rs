//! mdc-gen - Bytecode generation from MIR.
//!
//! Turns an (optionally optimised) MIR module into a serialisable
//! bytecode [`Module`](mdc_bc::Module): reverse-postorder block layout,
//! frame-slot assignment with live-interval reuse for temps, phi
//! elimination through predecessor moves, placeholder jumps patched once
//! offsets are known, and a peephole pass over the emitted instructions.

mod asm;
mod codegen;
mod error;
mod peephole;

#[cfg(test)]
mod tests;

pub use codegen::{generate_module, MAX_SLOTS};
pub use error::CodegenError;
