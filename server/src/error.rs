//! Unified error handling for the server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ordo_engine::ErrorKind;
use serde::Serialize;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Engine(#[from] ordo_engine::Error),

    #[error("Invalid request: {0}")]
    BadRequest(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: &'static str,
}

impl AppError {
    /// HTTP status and machine-readable kind for this error.
    pub fn status(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Database(_) => (StatusCode::SERVICE_UNAVAILABLE, ErrorKind::Transient.as_str()),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, ErrorKind::Invalid.as_str()),
            AppError::Engine(e) => {
                let status = match e.kind() {
                    ErrorKind::NotFound => StatusCode::NOT_FOUND,
                    ErrorKind::Forbidden => StatusCode::FORBIDDEN,
                    ErrorKind::Invalid => StatusCode::BAD_REQUEST,
                    ErrorKind::Conflict => StatusCode::CONFLICT,
                    ErrorKind::Transient => StatusCode::SERVICE_UNAVAILABLE,
                };
                (status, e.kind().as_str())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status();

        let error = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "Database unavailable".to_string()
            }
            other if status.is_server_error() => {
                tracing::error!("Request failed: {}", other);
                other.to_string()
            }
            other => {
                tracing::warn!("Request rejected: {}", other);
                other.to_string()
            }
        };

        (status, Json(ErrorResponse { error, kind })).into_response()
    }
}

/// Result type alias for handlers.
pub type Result<T> = std::result::Result<T, AppError>;
