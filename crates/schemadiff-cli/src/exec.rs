//! Command dispatch: acquire schemas, diff them and render the result.

use crate::error::ExecError;
use crate::input::read_statements;
use schemadiff_engine::{
    diff_create_tables, diff_create_views, DiffHints, EngineError, EntityDiff, EntityKind, Schema,
    SchemaDiff,
};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Global deadline applied when the caller does not pick one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Print the canonical CREATE statement of every entity in the source.
    Load,
    /// Print the changes from source to target, grouped by kind.
    Diff,
    /// Print the changes from source to target in an applicable order.
    OrderedDiff,
    /// Diff two single CREATE TABLE statements.
    DiffTable,
    /// Diff two single CREATE VIEW statements.
    DiffView,
    /// Reserved.
    Apply,
}

impl Command {
    pub const ALL: [Command; 6] = [
        Command::Load,
        Command::Diff,
        Command::OrderedDiff,
        Command::DiffTable,
        Command::DiffView,
        Command::Apply,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Load => "load",
            Command::Diff => "diff",
            Command::OrderedDiff => "ordered-diff",
            Command::DiffTable => "diff-table",
            Command::DiffView => "diff-view",
            Command::Apply => "apply",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = ExecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::ALL
            .into_iter()
            .find(|command| command.as_str() == s)
            .ok_or_else(|| ExecError::UnknownCommand(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecOptions {
    /// Render line-prefixed textual diffs instead of SQL statements.
    pub textual: bool,
    /// Deadline for the whole invocation, acquisition included.
    pub timeout: Duration,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            textual: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Run `command` against the `source` and `target` descriptors and return the
/// text to print. Every statement in the output ends with `;\n`.
pub async fn execute(
    command: Command,
    source: &str,
    target: &str,
    options: &ExecOptions,
) -> Result<String, ExecError> {
    let started_at = Instant::now();
    let deadline = started_at.checked_add(options.timeout).ok_or_else(|| {
        ExecError::InvalidArgument(format!("timeout of {:?} is too large", options.timeout))
    })?;
    info!(%command, textual = options.textual, "executing");

    let result = tokio::time::timeout(options.timeout, run(command, source, target, options, deadline))
        .await
        .map_err(|_| ExecError::Timeout(options.timeout))
        .and_then(|result| result);

    debug!(%command, elapsed = ?started_at.elapsed(), ok = result.is_ok(), "executed");
    result
}

async fn run(
    command: Command,
    source: &str,
    target: &str,
    options: &ExecOptions,
    deadline: Instant,
) -> Result<String, ExecError> {
    let mut output = String::new();

    match command {
        Command::Load => {
            let schema = load_schema(source).await?;
            for entity in schema.entities() {
                render(&mut output, &entity.create(), options.textual);
            }
        }
        Command::Diff => {
            ensure_distinct(source, target)?;
            let diff = diff_schemas(source, target).await?;
            for change in diff.unordered_diffs() {
                render(&mut output, change, options.textual);
            }
        }
        Command::OrderedDiff => {
            ensure_distinct(source, target)?;
            let diff = diff_schemas(source, target).await?;
            for change in &ordered_diffs(diff, deadline, options.timeout).await? {
                render(&mut output, change, options.textual);
            }
        }
        Command::DiffTable => {
            ensure_distinct(source, target)?;
            let from = read_single_statement(source, EntityKind::Table).await?;
            let to = read_single_statement(target, EntityKind::Table).await?;
            let diff = diff_create_tables(&from, &to, &DiffHints::default())?;
            if !diff.is_empty() {
                render(&mut output, &diff, options.textual);
            }
        }
        Command::DiffView => {
            ensure_distinct(source, target)?;
            let from = read_single_statement(source, EntityKind::View).await?;
            let to = read_single_statement(target, EntityKind::View).await?;
            let diff = diff_create_views(&from, &to, &DiffHints::default())?;
            if !diff.is_empty() {
                render(&mut output, &diff, options.textual);
            }
        }
        Command::Apply => {}
    }

    Ok(output)
}

/// Descriptors are compared as given, before classification.
fn ensure_distinct(source: &str, target: &str) -> Result<(), ExecError> {
    if source == target {
        return Err(ExecError::IdenticalSourceTarget);
    }
    Ok(())
}

fn render(output: &mut String, diff: &EntityDiff, textual: bool) {
    if textual {
        output.push_str(&diff.textual_diff());
    } else {
        output.push_str(&diff.canonical_statement_string());
    }
    output.push_str(";\n");
}

/// Read, validate and normalize the schema a descriptor points at.
pub async fn load_schema(descriptor: &str) -> Result<Schema, ExecError> {
    let statements = read_statements(descriptor).await?;
    Ok(Schema::from_queries(&statements)?)
}

pub async fn diff_schemas(source: &str, target: &str) -> Result<SchemaDiff, ExecError> {
    let from = load_schema(source).await?;
    let to = load_schema(target).await?;
    Ok(from.diff(&to, &DiffHints::default()))
}

async fn ordered_diffs(
    diff: SchemaDiff,
    deadline: Instant,
    timeout: Duration,
) -> Result<Vec<EntityDiff>, ExecError> {
    let ordered = tokio::task::spawn_blocking(move || diff.ordered_diffs(deadline)).await?;
    ordered.map_err(|err| match err {
        EngineError::DeadlineExceeded => ExecError::Timeout(timeout),
        other => ExecError::Engine(other),
    })
}

async fn read_single_statement(descriptor: &str, kind: EntityKind) -> Result<String, ExecError> {
    let mut statements = read_statements(descriptor).await?;
    if statements.len() != 1 {
        return Err(ExecError::StatementCount {
            kind,
            found: statements.len(),
            source_descriptor: descriptor.to_string(),
        });
    }
    Ok(statements.remove(0))
}
