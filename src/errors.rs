use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// ApiError
///
/// The taxonomy of failures the REST backend can hand back to the shell.
///
/// - `Unauthorized`: the credential was rejected or has expired. The Session Store
///   absorbs this during profile resolution by forcing a logout.
/// - `Validation`: malformed client input, surfaced inline. No session change.
/// - `Conflict`: duplicate registration, surfaced inline.
/// - `Transient`: network or server failure. Session state is preserved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("credential rejected")]
    Unauthorized,
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("backend unavailable: {0}")]
    Transient(String),
}

impl ApiError {
    /// Stable, machine-readable code used in HTTP error bodies and log fields.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized => "unauthorized",
            ApiError::Validation(_) => "validation_error",
            ApiError::Conflict(_) => "conflict",
            ApiError::Transient(_) => "transient_error",
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Transient(_))
    }
}

/// StorageError
///
/// Failure reading or writing the durable token slot.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("token store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("token store is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("token store unavailable: {0}")]
    Unavailable(String),
}

/// SessionError
///
/// Everything a Session Store operation can report upward. Errors never leave the
/// session half-updated: the store either completes a transition or leaves it untouched.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            SessionError::Api(ApiError::Unauthorized) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            SessionError::Api(ApiError::Validation(_)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "validation_error")
            }
            SessionError::Api(ApiError::Conflict(_)) => (StatusCode::CONFLICT, "conflict"),
            SessionError::Api(ApiError::Transient(_)) => (StatusCode::BAD_GATEWAY, "transient_error"),
            SessionError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Session operation failed");
        }

        let body = ErrorBody {
            error: code,
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
