//! Error types for the compute API.
//!
//! Each variant is either terminal (retrying cannot help, the record is
//! marked failed) or transient (the record stays claimable). The HTTP
//! status of each variant tells a remote dispatcher which one it got.

use simflow_core::ModelError;
use simflow_db::DbError;
use simflow_server::ApiError;
use simflow_types::JobKind;
use uuid::Uuid;

/// Errors that can occur while computing a result.
#[derive(Debug, thiserror::Error)]
pub enum ComputeError {
    /// No record with that id.
    #[error("{kind} {id} not found")]
    NotFound {
        /// Record kind.
        kind: JobKind,
        /// Requested id.
        id: Uuid,
    },

    /// The spec names a model version that is not registered.
    #[error("{0}")]
    ModelVersionNotFound(String),

    /// An input simulation has no result yet.
    #[error("{0}")]
    SourceNotReady(String),

    /// The stored spec cannot be run (undecodable, bad parameter, failed
    /// input simulation).
    #[error("{0}")]
    InvalidSpec(String),

    /// The remote model service is unreachable or failing.
    #[error("model service error: {0}")]
    Remote(String),

    /// The job store failed.
    #[error(transparent)]
    Database(#[from] DbError),
}

impl ComputeError {
    /// Whether retrying the same request can never succeed.
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::ModelVersionNotFound(_) | Self::InvalidSpec(_)
        )
    }

    /// Map a model failure: unknown versions keep their own variant, the
    /// rest mean the spec is unusable.
    pub fn from_model(error: &ModelError) -> Self {
        if error.is_version_not_found() {
            Self::ModelVersionNotFound(error.to_string())
        } else {
            Self::InvalidSpec(error.to_string())
        }
    }
}

impl From<ComputeError> for ApiError {
    fn from(error: ComputeError) -> Self {
        match error {
            ComputeError::NotFound { .. } => Self::NotFound(error.to_string()),
            ComputeError::ModelVersionNotFound(msg) => Self::ModelVersionNotFound(msg),
            ComputeError::SourceNotReady(msg) => Self::Conflict(msg),
            ComputeError::InvalidSpec(msg) => Self::Unprocessable(msg),
            ComputeError::Remote(_) => Self::Unavailable(error.to_string()),
            ComputeError::Database(e) => Self::Database(e),
        }
    }
}
