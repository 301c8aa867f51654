//! Classification of source descriptors.

use crate::dsn::ConnectionTarget;
use crate::error::ExecError;
use std::fmt;
use std::fs;
use std::path::PathBuf;

/// Where a schema is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    StandardInput,
    File(PathBuf),
    Directory(PathBuf),
    ConnectionUri(ConnectionTarget),
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::StandardInput => write!(f, "standard input"),
            SourceKind::File(path) => write!(f, "file {}", path.display()),
            SourceKind::Directory(path) => write!(f, "directory {}", path.display()),
            SourceKind::ConnectionUri(target) => write!(f, "database {target}"),
        }
    }
}

/// Classify a descriptor. The empty descriptor is standard input; an existing
/// path is a directory or file; otherwise it must parse as a connection
/// string.
pub fn classify(descriptor: &str) -> Result<SourceKind, ExecError> {
    if descriptor.is_empty() {
        return Ok(SourceKind::StandardInput);
    }
    if let Ok(metadata) = fs::metadata(descriptor) {
        let path = PathBuf::from(descriptor);
        return Ok(if metadata.is_dir() {
            SourceKind::Directory(path)
        } else {
            SourceKind::File(path)
        });
    }
    ConnectionTarget::parse(descriptor)
        .map(SourceKind::ConnectionUri)
        .ok_or_else(|| ExecError::UnknownInputSource(descriptor.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn test_empty_is_stdin() {
        assert_eq!(classify("").unwrap(), SourceKind::StandardInput);
    }

    #[test]
    fn test_existing_paths() {
        let dir = tempdir().unwrap();
        let descriptor = dir.path().to_str().unwrap();
        assert_eq!(
            classify(descriptor).unwrap(),
            SourceKind::Directory(dir.path().to_path_buf())
        );

        let file = NamedTempFile::new().unwrap();
        let descriptor = file.path().to_str().unwrap();
        assert_eq!(
            classify(descriptor).unwrap(),
            SourceKind::File(file.path().to_path_buf())
        );
    }

    #[test]
    fn test_connection_string() {
        let target = match classify("root@tcp(127.0.0.1:3306)/test#t1").unwrap() {
            SourceKind::ConnectionUri(target) => target,
            other => panic!("expected a connection string, got {other:?}"),
        };
        assert_eq!(target.database, "test");
        assert_eq!(target.entity.as_deref(), Some("t1"));
    }

    #[test]
    fn test_unknown_source() {
        let err = classify("no/such/file/or/dir").unwrap_err();
        assert!(matches!(err, ExecError::UnknownInputSource(ref d) if d == "no/such/file/or/dir"));
        assert_eq!(err.to_string(), "unknown input source: no/such/file/or/dir");
    }
}
