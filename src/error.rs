//! Error taxonomy (spec §7). Per-item failures are caught at the worker loop boundary and
//! turned into row status; only the variants below propagate out of a stage.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("failed to open store at {path}: {source}")]
    StorageOpen {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("store integrity error: {0}")]
    StorageIntegrity(String),

    #[error("permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("path too long: {path}")]
    PathTooLong { path: PathBuf },

    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("hash algorithm unavailable on this platform: {0}")]
    HashAlgorithmUnavailable(String),

    #[error("verification mismatch on copy job {copy_job_id}")]
    VerificationMismatch { copy_job_id: i64 },

    #[error("cancelled")]
    Cancelled,
}

impl EngineError {
    pub fn from_io(path: &std::path::Path, source: std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::NotFound => EngineError::FileNotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => EngineError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => EngineError::Io {
                path: path.to_path_buf(),
                source,
            },
        }
    }

    /// Per-file errors that are logged, counted, and do not halt the stage.
    pub fn is_transient_per_item(&self) -> bool {
        matches!(
            self,
            EngineError::FileNotFound { .. }
                | EngineError::PermissionDenied { .. }
                | EngineError::PathTooLong { .. }
                | EngineError::Io { .. }
        )
    }

    /// Non-retryable copy-job failures (spec §4.5 retry policy).
    pub fn is_non_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::PermissionDenied { .. } | EngineError::FileNotFound { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
