use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by the liveness and history core.
#[derive(Debug, Error)]
pub enum MeshError {
    /// Missing or malformed required field. Caller error, not retried.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("node '{0}' is already registered")]
    DuplicateNode(String),

    /// Heartbeat for an id the registry has never seen.
    #[error("heartbeat from unregistered node '{0}'")]
    UnknownNode(String),

    #[error("node '{0}' not found")]
    NotFound(String),

    /// Storage collaborator failed or timed out. Safe to retry with backoff.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("heartbeat interval ({interval_secs}s) must be non-zero and below offline threshold ({threshold_secs}s)")]
    ConfigInvariantViolation { interval_secs: i64, threshold_secs: i64 },
}

/// Wire-friendly classification of [`MeshError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    DuplicateNode,
    UnknownNode,
    NotFound,
    StorageUnavailable,
    ConfigInvariantViolation,
}

impl MeshError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MeshError::InvalidInput(_) => ErrorKind::InvalidInput,
            MeshError::DuplicateNode(_) => ErrorKind::DuplicateNode,
            MeshError::UnknownNode(_) => ErrorKind::UnknownNode,
            MeshError::NotFound(_) => ErrorKind::NotFound,
            MeshError::StorageUnavailable(_) => ErrorKind::StorageUnavailable,
            MeshError::ConfigInvariantViolation { .. } => ErrorKind::ConfigInvariantViolation,
        }
    }

    /// Only storage failures are transient.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MeshError::StorageUnavailable(_))
    }
}

impl From<sqlx::Error> for MeshError {
    fn from(e: sqlx::Error) -> Self {
        MeshError::StorageUnavailable(e.to_string())
    }
}

pub type MeshResult<T> = Result<T, MeshError>;
