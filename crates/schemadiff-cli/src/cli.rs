//! CLI argument parsing using clap.

use crate::exec::ExecOptions;
use clap::Parser;
use std::time::Duration;

/// Schemadiff - load and diff MySQL schemas
#[derive(Parser, Debug)]
#[command(name = "schemadiff")]
#[command(about = "Load, normalize and diff MySQL schemas", long_about = None)]
#[command(version)]
pub struct Args {
    /// Command to run: load, diff, ordered-diff, diff-table, diff-view or apply
    #[arg(value_name = "COMMAND")]
    pub command: String,

    /// Input source: file, directory of .sql files, connection string, or empty for stdin
    #[arg(long, default_value = "", value_name = "DESCRIPTOR")]
    pub source: String,

    /// Input target: file, directory of .sql files, connection string, or empty for stdin
    #[arg(long, default_value = "", value_name = "DESCRIPTOR")]
    pub target: String,

    /// Output textual diff rather than semantic SQL diff
    #[arg(long)]
    pub textual: bool,

    /// Deadline for the whole invocation, in seconds
    #[arg(long, default_value_t = 300, value_name = "SECONDS")]
    pub timeout: u64,

    /// Log debug output to stderr
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn exec_options(&self) -> ExecOptions {
        ExecOptions {
            textual: self.textual,
            timeout: Duration::from_secs(self.timeout),
        }
    }
}
