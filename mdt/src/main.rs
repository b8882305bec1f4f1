//! mdt - the Machine Dialect tool.
//!
//! Compiles prose-Markdown sources to `.mdc` bytecode modules, runs them,
//! disassembles them, and offers a line-oriented shell.
//!
//! Exit codes: 0 success, 1 compile error, 2 runtime error, 3 I/O error.

mod commands;
mod config;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{compile, disasm, run, shell};
use config::Config;

/// mdt - compile and run Machine Dialect programs
#[derive(Parser, Debug)]
#[command(name = "mdt")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Compile and run Machine Dialect programs", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true, env = "MDT_VERBOSE")]
    verbose: bool,

    /// Path to configuration file
    #[arg(long, global = true, env = "MDT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile a source file to a bytecode module
    Compile(compile::CompileArgs),

    /// Execute a compiled module
    Run(run::RunArgs),

    /// Dump the bytecode of a compiled module
    Disasm(disasm::DisasmArgs),

    /// Interactive shell
    Shell(shell::ShellArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("mdt: {err}");
            return ExitCode::from(err.exit_code() as u8);
        }
    };

    let result = match &cli.command {
        Commands::Compile(args) => compile::execute(args, &config),
        Commands::Run(args) => run::execute(args, &config),
        Commands::Disasm(args) => disasm::execute(args),
        Commands::Shell(args) => shell::execute(args, &config),
    };

    match result {
        Ok(code) => ExitCode::from(code as u8),
        Err(err) => {
            eprintln!("mdt: {err}");
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

fn init_tracing(cli: &Cli) {
    // `run -d` wants instruction tracing; otherwise verbosity decides.
    let default_filter = match &cli.command {
        Commands::Run(args) if args.debug => "mdc_vm=trace",
        _ if cli.verbose => "debug",
        _ => "warn",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}
