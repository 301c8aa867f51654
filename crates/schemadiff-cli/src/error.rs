//! Error type shared by source acquisition and command execution.

use schemadiff_engine::{EngineError, EntityKind};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecError {
    /// The descriptor is neither an existing path nor a connection string.
    #[error("unknown input source: {0}")]
    UnknownInputSource(String),

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("--source and --target must be different")]
    IdenticalSourceTarget,

    /// A single-entity command got a source with the wrong number of statements.
    #[error("expected one CREATE {kind} statement, found {found} entities in {source_descriptor}")]
    StatementCount {
        kind: EntityKind,
        found: usize,
        source_descriptor: String,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{context}: {source}")]
    Database {
        context: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("deadline of {0:?} exceeded")]
    Timeout(Duration),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("introspection worker failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ExecError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        Self::Io {
            context: format!("failed to read {}", path.display()),
            source,
        }
    }

    pub(crate) fn database(context: impl Into<String>, source: sqlx::Error) -> Self {
        Self::Database {
            context: context.into(),
            source,
        }
    }

    /// True for failures caused by the global deadline rather than by I/O or
    /// validation.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}
