use crate::store::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Message returned to callers rejected by an open circuit
pub const UNAVAILABLE_MESSAGE: &str = "Service temporarily unavailable";

/// Result type for warden operations
pub type Result<T> = std::result::Result<T, WardenError>;

/// Warden error types
#[derive(Error, Debug)]
pub enum WardenError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("State store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid direction: {0} (expected inbound or outbound)")]
    InvalidDirection(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("{}", UNAVAILABLE_MESSAGE)]
    CircuitOpen { endpoint: String },

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WardenError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            WardenError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            WardenError::Store(_) => StatusCode::BAD_GATEWAY,
            WardenError::InvalidDirection(_) => StatusCode::BAD_REQUEST,
            WardenError::BadRequest(_) => StatusCode::BAD_REQUEST,
            WardenError::CircuitOpen { .. } => StatusCode::SERVICE_UNAVAILABLE,
            WardenError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            WardenError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for WardenError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
