// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Credential lifecycle failures.
///
/// Cloneable so that every caller waiting on a shared refresh observes the
/// same failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("No access token available. Please enter your Setmore API credentials.")]
    NoCredential,

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),
}

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("Failed to fetch {endpoint}: {message}")]
    Fetch {
        endpoint: String,
        /// Last HTTP status seen, `None` for transport failures.
        status: Option<u16>,
        message: String,
    },

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("{error}")]
    Upstream {
        status: u16,
        error: String,
        details: Option<String>,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// True when the error means the stored credential is unusable and the
    /// user has to provide new credentials.
    pub fn requires_reauthentication(&self) -> bool {
        matches!(self, AppError::Token(_))
    }

    /// HTTP status of a failed fetch, if one was received.
    pub fn fetch_status(&self) -> Option<u16> {
        match self {
            AppError::Fetch { status, .. } => *status,
            _ => None,
        }
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
        let (status, error, details) = match self {
            AppError::Token(err) => (
                StatusCode::UNAUTHORIZED,
                "invalid_token".to_string(),
                Some(err.to_string()),
            ),
            AppError::Fetch {
                endpoint, message, ..
            } => (
                StatusCode::BAD_GATEWAY,
                "fetch_failed".to_string(),
                Some(format!("{}: {}", endpoint, message)),
            ),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found".to_string(), Some(msg)),
            AppError::Upstream {
                status,
                error,
                details,
            } => (
                StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                error,
                details,
            ),
            AppError::Storage(msg) => {
                tracing::error!(error = %msg, "Storage error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "storage_error".to_string(),
                    None,
                )
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    Some(err.to_string()),
                )
            }
        };

        (status, Json(ErrorResponse { error, details })).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
