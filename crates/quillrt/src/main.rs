//! Quill CLI - load, check and inspect Quill modules.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use quill_vm_core::VmError;
use tracing_subscriber::filter::EnvFilter;

mod commands;
mod config;

#[derive(Parser)]
#[command(
    name = "quill",
    version,
    about = "Load, check and inspect Quill modules",
    long_about = "Quill loads compiled .qmod modules into an isolated vault.\n\n\
                  Check a module:    quill check app.qmod\n\
                  List its classes:  quill inspect app.qmod"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a module with its dependencies and verify its entry point
    Check(commands::check::CheckCommand),

    /// Print the classes, methods and aspects of a module
    Inspect(commands::inspect::InspectCommand),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let directive = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            exit_code(&err)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Check(cmd) => cmd.run(&config),
        Commands::Inspect(cmd) => cmd.run(&config),
    }
}

/// Fatal VM conditions exit with their reason code; anything else with 1
fn exit_code(err: &anyhow::Error) -> ExitCode {
    let code = err
        .downcast_ref::<VmError>()
        .and_then(VmError::code)
        .map_or(1, |code| code as i32);
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
