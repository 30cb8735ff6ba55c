//! HTTP error mapping for the progress tracker API
//!
//! Caller mistakes become 4xx responses carrying the message. Everything else
//! is logged in full and answered with a generic 500.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cpt_common::Error;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Payload too large (413)
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// cpt-common error, mapped by kind
    #[error(transparent)]
    Common(#[from] Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", msg)
            }
            ApiError::Common(err) => {
                if err.is_client_error() {
                    warn!(error = %err, "Request rejected");
                }
                match err {
                    Error::Schema(msg) => (StatusCode::BAD_REQUEST, "SCHEMA_ERROR", msg),
                    Error::Parse(msg) => (StatusCode::BAD_REQUEST, "PARSE_ERROR", msg),
                    Error::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg),
                    Error::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
                    Error::Upstream(ref detail) => {
                        error!(error = %detail, "Completion service failure");
                        (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            "UPSTREAM_ERROR",
                            "Narrative service unavailable".to_string(),
                        )
                    }
                    other => {
                        error!(error = %other, "Request failed");
                        (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            "INTERNAL_ERROR",
                            "Internal server error".to_string(),
                        )
                    }
                }
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
