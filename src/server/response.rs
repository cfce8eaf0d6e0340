//! HTTP status mapping
//!
//! Every failure a route can produce is an [`ApiError`]; its
//! `IntoResponse` impl is the single place statuses and bodies are chosen.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::store::TodoId;

/// Body sent for any 500
pub const INTERNAL_ERROR_BODY: &str =
    "500 Internal Server Error: An unexpected condition was encountered.";

/// Client-visible request failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Body is not JSON or does not match the expected shape
    #[error("Invalid JSON payload: {0}")]
    InvalidPayload(String),

    /// Path id is not an unsigned integer
    #[error("Invalid todo id: {0}")]
    InvalidId(String),

    /// Body exceeds the configured limit
    #[error("Payload too large: limit is {0} bytes")]
    PayloadTooLarge(usize),

    /// No record with this id
    #[error("todo_id: {0} not found.")]
    NotFound(TodoId),

    /// Unanticipated failure; the detail is logged, never sent
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidPayload(_) | ApiError::InvalidId(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<crate::error::Error> for ApiError {
    fn from(err: crate::error::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match &self {
            ApiError::Internal(_) => INTERNAL_ERROR_BODY.to_string(),
            other => other.to_string(),
        };
        (self.status(), body).into_response()
    }
}

/// Parse a path segment into a record id
pub fn parse_id(raw: &str) -> Result<TodoId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::InvalidId(raw.to_string()))
}
