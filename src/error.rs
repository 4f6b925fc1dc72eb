//! Error types for the exam service
//!
//! Provides unified error handling using thiserror. Every variant is reported
//! to clients through the same `{code, msg, data}` envelope with HTTP 500.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use crate::models::ApiResponse;

// == Service Error Enum ==
/// Unified error type for the exam service.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Request cannot be served as given (e.g. blank prompt)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Uploaded bytes are not a decodable image
    #[error("Image decode failed: {0}")]
    Decode(String),

    /// Remote model call failed after the retry budget was spent
    #[error("Upstream model error: {0}")]
    Upstream(String),

    /// Cache directory or entry could not be read or written
    #[error("Cache storage error: {0}")]
    Storage(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        ServiceError::Storage(err.to_string())
    }
}

impl From<image::ImageError> for ServiceError {
    fn from(err: image::ImageError) -> Self {
        ServiceError::Decode(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        error!(error = ?self, "request failed: {}", self);

        let body = Json(ApiResponse::<()>::failure(self.to_string()));
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the exam service.
pub type Result<T> = std::result::Result<T, ServiceError>;
