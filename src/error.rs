//! Error types for tempo-detect
//!
//! Domain-specific error enums using thiserror. Only `DetectError` ever
//! reaches a caller of the detection pipeline; reader-level errors are
//! logged and treated as "no session".

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("failed to run git {args}: {source}")]
    Spawn {
        args: String,
        #[source]
        source: std::io::Error,
    },
    #[error("git {args} failed: {stderr}")]
    Failed { args: String, stderr: String },
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store not found: {0}")]
    Missing(PathBuf),
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("sqlite3 executable not available")]
    CliUnavailable,
    #[error("sqlite3 on {path}: {source}")]
    CliSpawn {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("sqlite3 query on {path} failed: {stderr}")]
    CliFailed { path: String, stderr: String },
    #[error("sqlite3 output: {0}")]
    CliOutput(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("I/O {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ReadError {
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        ReadError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    pub fn json(path: impl AsRef<std::path::Path>, source: serde_json::Error) -> Self {
        ReadError::Json {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

/// Detection could not run at all.
#[derive(Debug, thiserror::Error)]
pub enum DetectError {
    #[error("resolving committed files: {0}")]
    Context(#[from] GitError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_failed_display() {
        let error = GitError::Failed {
            args: "diff --name-only HEAD~1 HEAD".to_string(),
            stderr: "fatal: ambiguous argument 'HEAD~1'".to_string(),
        };
        let display = error.to_string();
        assert!(display.contains("git diff --name-only HEAD~1 HEAD failed"));
        assert!(display.contains("ambiguous argument"));
    }

    #[test]
    fn test_read_error_io_display() {
        let error = ReadError::io(
            "/home/dev/.claude/projects/x/s.jsonl",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "permission denied"),
        );
        let display = error.to_string();
        assert!(display.contains("/home/dev/.claude/projects/x/s.jsonl"));
        assert!(display.contains("permission denied"));
    }

    #[test]
    fn test_detect_error_wraps_git_error() {
        let error: DetectError = GitError::Failed {
            args: "diff".to_string(),
            stderr: "not a git repository".to_string(),
        }
        .into();
        assert!(error.to_string().starts_with("resolving committed files"));
    }

    #[test]
    fn test_git_spawn_error_preserves_io_error_kind() {
        let error = GitError::Spawn {
            args: "rev-parse HEAD".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };

        let source_err = std::error::Error::source(&error).unwrap();
        let io_err = source_err.downcast_ref::<std::io::Error>().unwrap();
        assert_eq!(io_err.kind(), std::io::ErrorKind::NotFound);
    }
}
