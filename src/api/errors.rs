//! API Error Handling
//!
//! Structured error responses with HTTP status codes and request tracking.

use crate::errors::WagerError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

/// Top-level API error response with request tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub request_id: String,
    pub error: ErrorBody,
}

/// Error body with structured information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Error code (INSUFFICIENT_BALANCE, BAD_REQUEST, ...)
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API error types with request tracking
#[derive(Debug)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub request_id: String,
}

#[derive(Debug)]
pub enum ApiErrorKind {
    Wager(WagerError),
    BadRequest(String),
    Unauthorized(String),
}

impl ApiError {
    pub fn wager(request_id: String, error: WagerError) -> Self {
        Self {
            kind: ApiErrorKind::Wager(error),
            request_id,
        }
    }

    pub fn bad_request(request_id: String, message: String) -> Self {
        Self {
            kind: ApiErrorKind::BadRequest(message),
            request_id,
        }
    }

    pub fn unauthorized(request_id: String, message: String) -> Self {
        Self {
            kind: ApiErrorKind::Unauthorized(message),
            request_id,
        }
    }

    fn status(&self) -> StatusCode {
        match &self.kind {
            ApiErrorKind::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiErrorKind::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiErrorKind::Wager(e) => match e {
                WagerError::AccountNotFound(_) | WagerError::EntryNotFound(_) => StatusCode::NOT_FOUND,
                WagerError::AccountExists(_) | WagerError::ResolutionConflict(_) => StatusCode::CONFLICT,
                WagerError::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::BAD_REQUEST,
            },
        }
    }
}

fn details(error: &WagerError) -> Option<serde_json::Value> {
    match error {
        WagerError::InsufficientBalance { required, available } => {
            Some(json!({ "required": required, "available": available }))
        }
        WagerError::InvalidAmount { bet, amount } => Some(json!({ "bet": bet, "amount": amount })),
        WagerError::Persistence(_) => Some(json!({ "retryable": true })),
        _ => None,
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ApiErrorKind::Wager(e) => write!(f, "[{}] {}: {}", self.request_id, e.code(), e),
            ApiErrorKind::BadRequest(msg) => write!(f, "[{}] Bad Request: {}", self.request_id, msg),
            ApiErrorKind::Unauthorized(msg) => write!(f, "[{}] Unauthorized: {}", self.request_id, msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message, details) = match &self.kind {
            ApiErrorKind::Wager(e) => (e.code(), e.to_string(), details(e)),
            ApiErrorKind::BadRequest(msg) => ("BAD_REQUEST", msg.clone(), None),
            ApiErrorKind::Unauthorized(msg) => ("UNAUTHORIZED", msg.clone(), None),
        };

        if status.is_server_error() {
            tracing::error!(request_id = %self.request_id, code, %message, "Request failed");
        }

        let body = Json(ErrorResponse {
            request_id: self.request_id,
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        });

        (status, body).into_response()
    }
}
