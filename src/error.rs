// SPDX-License-Identifier: MIT

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Missing, invalid, or expired credential. The client is never told
    /// which; an expired refresh token answers exactly like an absent one.
    #[error("Authentication required")]
    Unauthenticated,

    /// The upstream provider rejected a code exchange or identity fetch.
    /// Authorization codes are single-use, so this is never retried.
    #[error("Upstream authentication failed: {0}")]
    UpstreamAuth(String),

    /// An upstream revoke call failed. Callers log and swallow this:
    /// local logout/unlink must succeed regardless.
    #[error("Upstream revocation failed: {0}")]
    UpstreamRevocation(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthenticated", None),
            AppError::UpstreamAuth(msg) => {
                tracing::warn!(error = %msg, "Upstream auth failure");
                (StatusCode::UNAUTHORIZED, "upstream_auth_failed", None)
            }
            AppError::UpstreamRevocation(msg) => {
                // Reaching here means a caller propagated what should have
                // been swallowed; respond as a gateway failure.
                tracing::error!(error = %msg, "Upstream revocation error escaped");
                (StatusCode::BAD_GATEWAY, "upstream_error", None)
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
