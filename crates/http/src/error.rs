//! Error handling for the biblio HTTP layer

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// Application error types that map to HTTP responses
#[derive(Error, Debug)]
pub enum AppError {
    #[error("validation error: {message}")]
    Validation { message: String },

    #[error("not found: {message}")]
    NotFound { message: String },

    #[error("bad request: {message}")]
    BadRequest { message: String },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let error_id = Uuid::new_v4();

        let (status, error_code, message) = match self {
            AppError::Validation { message } => {
                (StatusCode::BAD_REQUEST, "validation_error", message)
            }
            AppError::NotFound { message } => (StatusCode::NOT_FOUND, "not_found", message),
            AppError::BadRequest { message } => (StatusCode::BAD_REQUEST, "bad_request", message),
            AppError::Internal(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                format!("{:#}", e),
            ),
        };

        tracing::error!(
            error_id = %error_id,
            error_code = error_code,
            status_code = %status.as_u16(),
            message = %message,
            "request error"
        );

        // Store-level detail stays in the server logs; clients only ever see
        // a generic message for 500s.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            "internal server error".to_string()
        } else {
            message
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
