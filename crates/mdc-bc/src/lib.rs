//! mdc-bc - The compiled bytecode module format.
//!
//! A [`Module`] is the only persistable artifact of the pipeline: an
//! interned string table, a deduplicated constant pool, a symbol table of
//! globals, the main chunk and the function chunks. This crate defines the
//! instruction set ([`Op`]), the in-memory model, the binary `.mdc`
//! serialisation (see [`format`]) and a disassembler.
//!
//! ```
//! use mdc_bc::{Module, ModuleBuilder, BcConst, Chunk};
//!
//! let mut builder = ModuleBuilder::new("demo");
//! builder.add_const(BcConst::Int(42));
//! let module = builder.finish(Chunk::default(), Vec::new());
//!
//! let bytes = module.encode();
//! assert_eq!(Module::decode(&bytes).unwrap(), module);
//! ```

pub mod chunk;
pub mod disasm;
pub mod format;
pub mod module;
pub mod opcode;

pub use chunk::{Chunk, LineTable};
pub use disasm::disassemble;
pub use format::{DecodeError, FLAG_LITTLE_ENDIAN, MAGIC, VERSION};
pub use module::{BcConst, Module, ModuleBuilder};
pub use opcode::{Op, OperandKind};
