//! Schemadiff CLI library.
//!
//! This module exposes source acquisition and command execution for testing
//! and embedding. The main entry point is the `schemadiff` binary.

pub mod cli;
pub mod dsn;
pub mod error;
pub mod exec;
pub mod input;
pub mod introspect;
pub mod source;

// Re-export commonly used types
pub use cli::Args;
pub use dsn::ConnectionTarget;
pub use error::ExecError;
pub use exec::{execute, Command, ExecOptions, DEFAULT_TIMEOUT};
pub use source::{classify, SourceKind};
