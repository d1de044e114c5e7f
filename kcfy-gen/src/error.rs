//! HTTP error type for kcfy-gen

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::ValidationError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Form field rejected (400), reported with its field name
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Conflict (409), e.g. cancelling a finished session
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Validation(ref err) = self {
            let body = Json(json!({
                "error": {
                    "code": "VALIDATION_ERROR",
                    "field": err.field(),
                    "message": err.to_string(),
                }
            }));
            return (StatusCode::BAD_REQUEST, body).into_response();
        }

        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::Validation(ref err) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", err.to_string())
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
