//! Schemadiff CLI - MySQL schema loader and differ

use anyhow::{Context, Result};
use clap::Parser;
use schemadiff_cli::{execute, Args, Command};
use std::io::{self, Write};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Any failure: bad arguments, unreadable sources, invalid schemas, timeouts.
const EXIT_ERROR: u8 = 2;

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("schemadiff: error: {e:#}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Log to stderr so stdout only carries the rendered result.
fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(args: Args) -> Result<()> {
    let command: Command = args.command.parse()?;
    let options = args.exec_options();

    let runtime = tokio::runtime::Runtime::new().context("failed to create tokio runtime")?;
    let result = runtime.block_on(execute(command, &args.source, &args.target, &options));
    // A read still blocked on stdin after the deadline must not hold up exit.
    runtime.shutdown_background();
    let output = result?;

    let mut stdout = io::stdout().lock();
    stdout
        .write_all(output.as_bytes())
        .and_then(|()| stdout.flush())
        .context("failed to write output")?;
    Ok(())
}
