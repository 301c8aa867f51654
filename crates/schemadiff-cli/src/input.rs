//! Reading raw CREATE statements from a classified source.

use crate::error::ExecError;
use crate::introspect;
use crate::source::{classify, SourceKind};
use schemadiff_engine::split_statements;
use std::fs;
use std::path::Path;
use tokio::io::AsyncReadExt;
use tokio::task::spawn_blocking;
use tracing::debug;

/// Read the statements a descriptor points at.
///
/// Standard input and files may hold any number of `;`-separated statements.
/// Every regular `.sql` file directly inside a directory holds one statement.
/// Connection strings are introspected. Reading and splitting run off the
/// async workers so the caller's deadline can still fire.
pub async fn read_statements(descriptor: &str) -> Result<Vec<String>, ExecError> {
    let kind = classify(descriptor)?;
    debug!(source = %kind, "classified source");

    let statements = match kind {
        SourceKind::StandardInput => {
            let content = read_stdin().await?;
            spawn_blocking(move || split_statements(content.trim())).await??
        }
        SourceKind::File(path) => spawn_blocking(move || read_from_file(&path)).await??,
        SourceKind::Directory(path) => spawn_blocking(move || read_from_directory(&path)).await??,
        SourceKind::ConnectionUri(target) => introspect::read_database_schema(&target).await?,
    };

    debug!(statements = statements.len(), "read statements");
    Ok(statements)
}

async fn read_stdin() -> Result<String, ExecError> {
    let mut content = String::new();
    tokio::io::stdin()
        .read_to_string(&mut content)
        .await
        .map_err(|source| ExecError::Io {
            context: "failed to read standard input".to_string(),
            source,
        })?;
    Ok(content)
}

fn read_from_file(path: &Path) -> Result<Vec<String>, ExecError> {
    let content = fs::read_to_string(path).map_err(|err| ExecError::io(path, err))?;
    Ok(split_statements(content.trim())?)
}

fn read_from_directory(dir: &Path) -> Result<Vec<String>, ExecError> {
    let entries = fs::read_dir(dir).map_err(|err| ExecError::io(dir, err))?;

    let mut statements = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| ExecError::io(dir, err))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|err| ExecError::io(&path, err))?;
        if !file_type.is_file() || !has_sql_extension(&path) {
            continue;
        }
        let content = fs::read_to_string(&path).map_err(|err| ExecError::io(&path, err))?;
        statements.push(content.trim().to_string());
    }
    Ok(statements)
}

fn has_sql_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("sql"))
}
