use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Errors surfaced by the document and recording layers.
///
/// Every variant is terminal for the request that produced it; nothing is
/// retried locally.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("malformed timestamp at index {index}: {reason}")]
    MalformedTimestamp { index: usize, reason: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

pub type AppResult<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidIdentifier(_) => StatusCode::BAD_REQUEST,
            Self::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            Self::MalformedTimestamp { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ConnectionFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::StoreUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the caller sent something unusable, as opposed to the store failing.
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => Self::ConnectionFailed("timed out waiting for a pooled connection".to_string()),
            sqlx::Error::Io(e) => Self::ConnectionFailed(e.to_string()),
            sqlx::Error::Tls(e) => Self::ConnectionFailed(e.to_string()),
            other => Self::StoreUnavailable(other.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: &str) -> Self {
        Self {
            error: message.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("{}", self);
        } else {
            log::warn!("{}", self);
        }
        (status, Json(ErrorResponse::new(&self.to_string()))).into_response()
    }
}
