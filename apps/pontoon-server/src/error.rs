//! Error types for the pontoon server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use compliance_engine::OverrideError;
use serde::Serialize;
use thiserror::Error;

/// Server error types
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid override: {0}")]
    InvalidOverride(#[from] OverrideError),

    #[error("Batch of {size} documents exceeds the limit of {max}")]
    BatchTooLarge { size: usize, max: usize },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    code: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ServerError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            ServerError::InvalidOverride(_) => (StatusCode::BAD_REQUEST, "INVALID_OVERRIDE"),
            ServerError::BatchTooLarge { .. } => {
                (StatusCode::PAYLOAD_TOO_LARGE, "BATCH_TOO_LARGE")
            }
            ServerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = ErrorResponse {
            success: false,
            error: self.to_string(),
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<tokio::task::JoinError> for ServerError {
    fn from(err: tokio::task::JoinError) -> Self {
        ServerError::Internal(format!("background task failed: {}", err))
    }
}
