//! mdc-mir - Mid-level IR for Machine Dialect.
//!
//! MIR is Static Single Assignment form over a control-flow graph of basic
//! blocks. This crate holds the IR itself ([`mir`]), the HIR lowering
//! ([`lower_program`]), the CFG analyses ([`analysis`]), the optimisation
//! passes ([`optimize`]) and structural verification ([`verify`]).
//!
//! ```
//! use mdc_util::Handler;
//!
//! let handler = Handler::new();
//! let ast = mdc_par::parse("Set `x` to _2_ + _3_.", &handler);
//! let hir = mdc_hir::lower_program(&ast, &handler);
//! let mut module = mdc_mir::lower_program(&hir, &handler);
//! mdc_mir::optimize_module(&mut module, mdc_mir::OptLevel::Aggressive);
//! assert!(mdc_mir::verify_module(&module).is_ok());
//! ```

pub mod analysis;
mod lower;
pub mod mir;
pub mod optimize;
pub mod verify;

#[cfg(test)]
mod tests;

pub use lower::lower_program;
pub use mir::{
    BasicBlock, BinOp, BlockId, Callee, CmpOp, Constant, FuncId, Function, Inst, InstKind,
    Local, LocalId, Module, TempId, Terminator, UnOp, Value,
};
pub use optimize::{constant_folding, dead_code_elimination, optimize_module, OptLevel};
pub use verify::{verify_function, verify_module};
