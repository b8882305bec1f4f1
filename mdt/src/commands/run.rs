//! `mdt run <module.mdc> [-d]`

use std::path::PathBuf;

use clap::Parser;

use mdc_drv::exit_codes;
use mdc_vm::{Value, Vm, VmOptions};

use crate::commands::load_module;
use crate::config::Config;
use crate::error::Result;

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Compiled module (.mdc)
    pub module: PathBuf,

    /// Trace execution (instruction-level logging to stderr)
    #[arg(short = 'd', long)]
    pub debug: bool,
}

pub fn execute(args: &RunArgs, config: &Config) -> Result<i32> {
    let module = load_module(&args.module)?;

    // MD_VM_STACK still overrides the configured limit.
    let mut options = VmOptions::from_env();
    if std::env::var_os("MD_VM_STACK").is_none() {
        options.max_frames = config.vm.max_frames;
    }

    let mut vm = Vm::new(options);
    match vm.run(&module) {
        Ok(Value::Empty) => Ok(exit_codes::SUCCESS),
        Ok(value) => {
            println!("{}", value.repr());
            Ok(exit_codes::SUCCESS)
        }
        Err(err) => {
            eprintln!("runtime error: {err}");
            Ok(exit_codes::RUNTIME_ERROR)
        }
    }
}
