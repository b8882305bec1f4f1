//! mdc-drv - Pipeline driver.
//!
//! Orchestrates the phases: lex → parse → HIR → MIR → optimisation →
//! bytecode → VM. Compile-time problems accumulate as diagnostics; by
//! default code generation refuses to run while any error-level diagnostic
//! exists. Lenient mode compiles through recovered errors — every error
//! node has defined no-op semantics — which is what the shell and the
//! conformance scenarios for error recovery rely on.
//!
//! ```
//! use mdc_drv::{compile, CompileOptions};
//!
//! let module = compile("Give back _2_ + _2_.", &CompileOptions::default()).unwrap();
//! let result = mdc_drv::run_module(&module, mdc_vm::VmOptions::default()).unwrap();
//! assert_eq!(result.to_string(), "4");
//! ```

use tracing::debug;

use mdc_bc::Module;
use mdc_mir::OptLevel;
use mdc_util::diagnostic::codes;
use mdc_util::{Diagnostic, Handler, Span};
use mdc_vm::{RuntimeError, Value, Vm, VmOptions};

#[cfg(test)]
mod tests;

/// Compilation knobs.
#[derive(Clone, Debug)]
pub struct CompileOptions {
    pub opt_level: OptLevel,
    /// Name recorded in the module header.
    pub module_name: String,
    /// When set, any error-level diagnostic aborts before codegen. Lenient
    /// compiles keep going: recovered statements are no-ops, undefined
    /// reads are `Empty`.
    pub strict: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            opt_level: OptLevel::Aggressive,
            module_name: "main".to_owned(),
            strict: true,
        }
    }
}

impl CompileOptions {
    pub fn with_opt_level(mut self, level: OptLevel) -> Self {
        self.opt_level = level;
        self
    }

    pub fn with_module_name(mut self, name: impl Into<String>) -> Self {
        self.module_name = name.into();
        self
    }

    pub fn lenient(mut self) -> Self {
        self.strict = false;
        self
    }
}

/// A failed compile or run.
#[derive(Debug)]
pub enum DriverError {
    /// The collected compile diagnostics, in emission order.
    Compile(Vec<Diagnostic>),
    Runtime(RuntimeError),
}

impl std::fmt::Display for DriverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriverError::Compile(diagnostics) => {
                for (index, diagnostic) in diagnostics.iter().enumerate() {
                    if index > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{diagnostic}")?;
                }
                Ok(())
            }
            DriverError::Runtime(error) => write!(f, "{error}"),
        }
    }
}

impl std::error::Error for DriverError {}

/// Process exit codes shared with the CLI: 0 success, 1 compile error,
/// 2 runtime error, 3 I/O error.
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const COMPILE_ERROR: i32 = 1;
    pub const RUNTIME_ERROR: i32 = 2;
    pub const IO_ERROR: i32 = 3;
}

/// Compile a source buffer to a bytecode module.
///
/// On failure the returned diagnostics are ordered and deduplicated, and
/// always contain at least one error.
pub fn compile(source: &str, options: &CompileOptions) -> Result<Module, Vec<Diagnostic>> {
    let handler = Handler::new();

    debug!(phase = "parse", "starting");
    let ast = mdc_par::parse(source, &handler);

    debug!(phase = "hir", "lowering");
    let hir = mdc_hir::lower_program(&ast, &handler);

    if options.strict && handler.has_errors() {
        return Err(handler.take());
    }

    debug!(phase = "mir", "lowering");
    let mut mir = mdc_mir::lower_program(&hir, &handler);

    debug!(phase = "opt", level = ?options.opt_level, "optimising");
    mdc_mir::optimize_module(&mut mir, options.opt_level);

    debug!(phase = "codegen", "emitting bytecode");
    match mdc_gen::generate_module(&mir, &options.module_name, options.opt_level) {
        Ok(module) => Ok(module),
        Err(error) => {
            handler.error(codes::E_CODEGEN_LIMIT, error.to_string(), Span::DUMMY);
            Err(handler.take())
        }
    }
}

/// The diagnostics a lenient compile would report for `source`, without
/// building a module.
pub fn check(source: &str) -> Vec<Diagnostic> {
    let handler = Handler::new();
    let ast = mdc_par::parse(source, &handler);
    let _ = mdc_hir::lower_program(&ast, &handler);
    handler.take()
}

/// Lex a source buffer, for the shell's token-dumping mode.
pub fn tokens(source: &str) -> (Vec<mdc_lex::Token>, Vec<Diagnostic>) {
    let handler = Handler::new();
    let tokens = mdc_lex::tokenize(source, &handler);
    (tokens, handler.take())
}

/// Execute a compiled module.
pub fn run_module(module: &Module, vm_options: VmOptions) -> Result<Value, RuntimeError> {
    let mut vm = Vm::new(vm_options);
    vm.run(module)
}

/// Compile and run in one step.
pub fn run_source(
    source: &str,
    options: &CompileOptions,
    vm_options: VmOptions,
) -> Result<Value, DriverError> {
    let module = compile(source, options).map_err(DriverError::Compile)?;
    run_module(&module, vm_options).map_err(DriverError::Runtime)
}

/// The exit code for a finished run.
pub fn exit_code(result: &Result<Value, DriverError>) -> i32 {
    match result {
        Ok(_) => exit_codes::SUCCESS,
        Err(DriverError::Compile(_)) => exit_codes::COMPILE_ERROR,
        Err(DriverError::Runtime(_)) => exit_codes::RUNTIME_ERROR,
    }
}
