//! Error types for switchboard.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::time::Duration;

/// Result type alias for switchboard operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for switchboard.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Backend '{name}' not found")]
    NotFound { name: String },

    #[error("No backends are registered")]
    NoBackends,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Backend call failed: {0}")]
    Backend(#[from] BackendError),

    #[error("All {attempts} attempts failed: {message}")]
    Exhausted { attempts: u32, message: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::NoBackends => StatusCode::SERVICE_UNAVAILABLE,
            Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Error::Backend(_) | Error::Exhausted { .. } => StatusCode::BAD_GATEWAY,
            Error::Database(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({
            "error": {
                "message": self.to_string(),
                "type": "switchboard_error",
                "code": status.as_u16()
            }
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Failure of a single call to one vendor.
///
/// Every variant is recorded as a failed outcome by the backend that
/// produced it before being handed back to the caller.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    #[error("network error: {0}")]
    Network(String),

    #[error("vendor returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("operation '{operation}' is not supported by this backend")]
    Unsupported { operation: &'static str },
}

impl BackendError {
    /// Whether retrying the same call later could plausibly succeed.
    ///
    /// Network failures, timeouts, rate limits (429) and 5xx responses are
    /// transient. Everything else is a property of the request or backend.
    pub fn is_transient(&self) -> bool {
        match self {
            BackendError::Network(_) | BackendError::Timeout(_) => true,
            BackendError::Status { status, .. } => *status == 429 || (500..600).contains(status),
            BackendError::InvalidResponse(_) | BackendError::Unsupported { .. } => false,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            BackendError::InvalidResponse(e.to_string())
        } else {
            BackendError::Network(e.to_string())
        }
    }
}
