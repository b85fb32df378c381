//! Error type shared by the Simflow HTTP services.
//!
//! [`ApiError`] unifies all failure modes into a single enum that can be
//! converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation. Every
//! error response carries an [`ErrorBody`] so clients can branch on
//! `status` and `code` without parsing text.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use simflow_db::DbError;
use simflow_types::{ErrorBody, MODEL_VERSION_NOT_FOUND, RECORD_NOT_FOUND};

/// Errors that can occur while handling a request.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The requested record does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The requested model version does not exist.
    #[error("{0}")]
    ModelVersionNotFound(String),

    /// The request is malformed.
    #[error("{0}")]
    BadRequest(String),

    /// The request body failed validation.
    #[error("validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    /// The request cannot be served yet because an input is not ready.
    #[error("{0}")]
    Conflict(String),

    /// A stored value cannot be processed.
    #[error("{0}")]
    Unprocessable(String),

    /// The service is not healthy.
    #[error("{0}")]
    Unavailable(String),

    /// The persistent store failed.
    #[error("database error: {0}")]
    Database(#[from] DbError),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status this error maps to.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) | Self::ModelVersionNotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable code, for the errors callers branch on.
    pub const fn code(&self) -> Option<&'static str> {
        match self {
            Self::NotFound(_) => Some(RECORD_NOT_FOUND),
            Self::ModelVersionNotFound(_) => Some(MODEL_VERSION_NOT_FOUND),
            _ => None,
        }
    }

    /// The JSON body sent for this error.
    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.to_string(),
            status: self.status().as_u16(),
            code: self.code().map(str::to_owned),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        (status, axum::Json(self.body())).into_response()
    }
}
