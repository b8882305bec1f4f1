//! `mdt disasm <module.mdc>`

use std::path::PathBuf;

use clap::Parser;

use mdc_drv::exit_codes;

use crate::commands::load_module;
use crate::error::Result;

#[derive(Parser, Debug)]
pub struct DisasmArgs {
    /// Compiled module (.mdc)
    pub module: PathBuf,
}

pub fn execute(args: &DisasmArgs) -> Result<i32> {
    let module = load_module(&args.module)?;
    print!("{}", mdc_bc::disassemble(&module));
    Ok(exit_codes::SUCCESS)
}
