//! `mdt compile <src.md> [-o out.mdc] [--opt-level N] [-d]`

use std::path::PathBuf;

use clap::Parser;
use tracing::debug;

use mdc_drv::{exit_codes, CompileOptions};
use mdc_mir::OptLevel;

use crate::commands::{read_source, write_file};
use crate::config::Config;
use crate::error::Result;

#[derive(Parser, Debug)]
pub struct CompileArgs {
    /// Source file (.md)
    pub source: PathBuf,

    /// Output module path (default: the source with an .mdc extension)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Optimisation level
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=3))]
    pub opt_level: Option<u8>,

    /// Print a disassembly of the compiled module
    #[arg(short = 'd', long)]
    pub disassemble: bool,
}

pub fn execute(args: &CompileArgs, config: &Config) -> Result<i32> {
    let source = read_source(&args.source)?;
    let level = args.opt_level.unwrap_or(config.default_opt_level);

    let module_name = args
        .source
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "main".to_owned());

    let options = CompileOptions::default()
        .with_opt_level(OptLevel::from_cli(level))
        .with_module_name(module_name);

    debug!(source = %args.source.display(), level, "compiling");
    let module = match mdc_drv::compile(&source, &options) {
        Ok(module) => module,
        Err(diagnostics) => {
            for diagnostic in &diagnostics {
                eprintln!("{diagnostic}");
            }
            eprintln!(
                "compilation failed with {} diagnostic(s)",
                diagnostics.len()
            );
            return Ok(exit_codes::COMPILE_ERROR);
        }
    };

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| args.source.with_extension("mdc"));
    write_file(&output, &module.encode())?;
    debug!(output = %output.display(), "module written");

    if args.disassemble {
        print!("{}", mdc_bc::disassemble(&module));
    }

    Ok(exit_codes::SUCCESS)
}
