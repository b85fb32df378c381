//! Error types for dispatch.
//!
//! Every error is either transient (worth another try, first through the
//! request retry policy and then on a later pass) or terminal (the record
//! is marked failed with the error text).

use reqwest::StatusCode;
use simflow_compute::ComputeError;
use simflow_core::Retryable;
use simflow_db::DbError;
use simflow_types::{ErrorBody, RECORD_NOT_FOUND};

/// Errors that can occur while dispatching a record to compute.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The compute side does not have the requested model version.
    #[error("model version not found: {0}")]
    ModelVersionNotFound(String),

    /// The compute side does not have the record.
    #[error("record not found: {0}")]
    RecordNotFound(String),

    /// The compute side refused the request for good.
    #[error("compute rejected the request ({status}): {message}")]
    Rejected {
        /// HTTP status.
        status: u16,
        /// Response body or error text.
        message: String,
    },

    /// The compute side cannot serve the request right now.
    #[error("compute unavailable ({status}): {message}")]
    Unavailable {
        /// HTTP status.
        status: u16,
        /// Response body or error text.
        message: String,
    },

    /// The request did not complete (connect failure, timeout, reset).
    #[error("compute request failed: {0}")]
    Transport(String),

    /// The response body was not what the compute API sends.
    #[error("unexpected compute response: {0}")]
    Decode(String),

    /// The job store failed.
    #[error(transparent)]
    Database(#[from] DbError),

    /// The dispatcher cannot be built.
    #[error("dispatch configuration error: {0}")]
    Config(String),
}

impl DispatchError {
    /// Classify a non-success HTTP response.
    ///
    /// 404 is a missing model version unless the body says the record
    /// itself is missing. 408, 409, 429 and 5xx are transient. Any other
    /// status is a rejection.
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let parsed = serde_json::from_str::<ErrorBody>(body).ok();
        let message = parsed
            .as_ref()
            .map_or_else(|| body.to_owned(), |b| b.error.clone());

        if status == StatusCode::NOT_FOUND {
            let record_missing = parsed
                .as_ref()
                .and_then(|b| b.code.as_deref())
                .is_some_and(|code| code == RECORD_NOT_FOUND);
            return if record_missing {
                Self::RecordNotFound(message)
            } else {
                Self::ModelVersionNotFound(message)
            };
        }

        let transient = status.is_server_error()
            || matches!(
                status,
                StatusCode::REQUEST_TIMEOUT | StatusCode::CONFLICT | StatusCode::TOO_MANY_REQUESTS
            );
        if transient {
            Self::Unavailable {
                status: status.as_u16(),
                message,
            }
        } else {
            Self::Rejected {
                status: status.as_u16(),
                message,
            }
        }
    }

    /// Whether the record should be marked failed at once.
    pub fn is_terminal(&self) -> bool {
        !self.is_transient()
    }
}

impl Retryable for DispatchError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Unavailable { .. } | Self::Transport(_) | Self::Decode(_) | Self::Database(_)
        )
    }
}

impl From<reqwest::Error> for DispatchError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::Decode(error.to_string())
        } else {
            Self::Transport(error.to_string())
        }
    }
}

impl From<ComputeError> for DispatchError {
    fn from(error: ComputeError) -> Self {
        match error {
            ComputeError::NotFound { .. } => Self::RecordNotFound(error.to_string()),
            ComputeError::ModelVersionNotFound(msg) => Self::ModelVersionNotFound(msg),
            ComputeError::InvalidSpec(message) => Self::Rejected {
                status: StatusCode::UNPROCESSABLE_ENTITY.as_u16(),
                message,
            },
            ComputeError::SourceNotReady(message) => Self::Unavailable {
                status: StatusCode::CONFLICT.as_u16(),
                message,
            },
            ComputeError::Remote(_) => Self::Unavailable {
                status: StatusCode::SERVICE_UNAVAILABLE.as_u16(),
                message: error.to_string(),
            },
            ComputeError::Database(e) => Self::Database(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_defaults_to_model_version() {
        let err = DispatchError::from_response(
            StatusCode::NOT_FOUND,
            r#"{"error":"model version 9.9 not found","status":404,"code":"model_version_not_found"}"#,
        );
        assert!(matches!(err, DispatchError::ModelVersionNotFound(ref m) if m.contains("9.9")));
        assert!(err.is_terminal());
        assert!(err.to_string().starts_with("model version not found"));

        let bare = DispatchError::from_response(StatusCode::NOT_FOUND, "Not Found");
        assert!(matches!(bare, DispatchError::ModelVersionNotFound(_)));
    }

    #[test]
    fn not_found_with_record_code_is_record_not_found() {
        let err = DispatchError::from_response(
            StatusCode::NOT_FOUND,
            r#"{"error":"simulation x not found","status":404,"code":"record_not_found"}"#,
        );
        assert!(matches!(err, DispatchError::RecordNotFound(_)));
    }

    #[test]
    fn transient_statuses() {
        for status in [
            StatusCode::REQUEST_TIMEOUT,
            StatusCode::CONFLICT,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::BAD_GATEWAY,
            StatusCode::SERVICE_UNAVAILABLE,
        ] {
            assert!(
                DispatchError::from_response(status, "").is_transient(),
                "{status} should be transient"
            );
        }
    }

    #[test]
    fn other_client_errors_are_rejections() {
        for status in [StatusCode::BAD_REQUEST, StatusCode::UNPROCESSABLE_ENTITY] {
            let err = DispatchError::from_response(status, "nope");
            assert!(matches!(err, DispatchError::Rejected { .. }));
            assert!(err.is_terminal());
        }
    }

    #[test]
    fn compute_errors_keep_their_class() {
        let err = DispatchError::from(ComputeError::SourceNotReady("later".to_owned()));
        assert!(err.is_transient());
        let err = DispatchError::from(ComputeError::InvalidSpec("bad".to_owned()));
        assert!(err.is_terminal());
        let err = DispatchError::from(ComputeError::ModelVersionNotFound("0.1".to_owned()));
        assert!(matches!(err, DispatchError::ModelVersionNotFound(_)));
    }
}
