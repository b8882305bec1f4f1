//! `mdt shell [--tokens]`
//!
//! A line-oriented read-eval-print loop. Every line is compiled and run
//! as its own program (leniently, so a typo does not end the session);
//! with `--tokens` the line's token stream is dumped instead of running.

use std::io::{BufRead, Write};

use clap::Parser;

use mdc_drv::{exit_codes, CompileOptions, DriverError};
use mdc_mir::OptLevel;
use mdc_vm::{Value, VmOptions};

use crate::config::Config;
use crate::error::Result;

#[derive(Parser, Debug)]
pub struct ShellArgs {
    /// Print the token stream of each line instead of evaluating it
    #[arg(long)]
    pub tokens: bool,
}

pub fn execute(args: &ShellArgs, config: &Config) -> Result<i32> {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    writeln!(stdout, "Machine Dialect shell — empty line or Ctrl-D quits")?;

    let options = CompileOptions::default()
        .with_opt_level(OptLevel::from_cli(config.default_opt_level))
        .with_module_name("shell")
        .lenient();
    let mut vm_options = VmOptions::from_env();
    if std::env::var_os("MD_VM_STACK").is_none() {
        vm_options.max_frames = config.vm.max_frames;
    }

    for line in stdin.lock().lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            break;
        }

        if args.tokens {
            dump_tokens(&mut stdout, trimmed)?;
            continue;
        }

        match mdc_drv::run_source(trimmed, &options, vm_options.clone()) {
            Ok(Value::Empty) => {}
            Ok(value) => writeln!(stdout, "{}", value.repr())?,
            Err(DriverError::Compile(diagnostics)) => {
                for diagnostic in diagnostics {
                    writeln!(stdout, "{diagnostic}")?;
                }
            }
            Err(DriverError::Runtime(err)) => writeln!(stdout, "runtime error: {err}")?,
        }
        stdout.flush()?;
    }

    Ok(exit_codes::SUCCESS)
}

fn dump_tokens(stdout: &mut impl Write, line: &str) -> Result<()> {
    let (tokens, diagnostics) = mdc_drv::tokens(line);
    for token in tokens {
        if token.is_eof() {
            break;
        }
        writeln!(
            stdout,
            "{:>4}:{:<3} {:?}  {}",
            token.span.line, token.span.column, token.kind, token.lexeme
        )?;
    }
    for diagnostic in diagnostics {
        writeln!(stdout, "{diagnostic}")?;
    }
    Ok(())
}
