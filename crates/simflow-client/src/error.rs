//! Error types for the client.

use std::time::Duration;

use simflow_core::Retryable;
use simflow_types::JobKind;
use uuid::Uuid;

/// Errors returned by [`SimflowClient`](crate::SimflowClient).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The request did not complete.
    #[error("request failed: {0}")]
    Http(String),

    /// The server answered with an error status.
    #[error("server returned {status}: {message}")]
    Status {
        /// HTTP status.
        status: u16,
        /// `error` field of the body, or the raw body.
        message: String,
        /// Machine-readable code, when the server sent one.
        code: Option<String>,
    },

    /// The response body was not the expected shape.
    #[error("unexpected response body: {0}")]
    Decode(String),

    /// The record failed instead of producing a result.
    #[error("{kind} {id} failed: {error}")]
    Failed {
        /// Record kind.
        kind: JobKind,
        /// Record id.
        id: Uuid,
        /// Failure reason stored on the record.
        error: String,
    },

    /// No result appeared within the wait budget.
    #[error("{kind} {id} still has no result after {waited:?}")]
    Timeout {
        /// Record kind.
        kind: JobKind,
        /// Record id.
        id: Uuid,
        /// How long the client polled.
        waited: Duration,
    },

    /// The client cannot be built.
    #[error("client configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// HTTP status of a [`ClientError::Status`].
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Only 503 is retried: the service is starting or its store is down.
impl Retryable for ClientError {
    fn is_transient(&self) -> bool {
        self.status() == Some(503)
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::Decode(error.to_string())
        } else {
            Self::Http(error.to_string())
        }
    }
}
