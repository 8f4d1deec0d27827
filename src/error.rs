//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Account is disabled")]
    AccountDisabled,

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Book not found: {0}")]
    BookNotFound(String),

    #[error("Author not found: {0}")]
    AuthorNotFound(String),

    #[error("Genre not found: {0}")]
    GenreNotFound(String),

    #[error("Reader not found: {0}")]
    ReaderNotFound(String),

    #[error("Rental not found: {0}")]
    RentalNotFound(String),

    #[error("Book is already checked out")]
    BookUnavailable,

    #[error("Rental is already closed")]
    RentalAlreadyClosed,

    // Server errors (5xx)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = match &self {
            // 400 Bad Request
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", Some(msg.clone()))
            }

            // 401 Unauthorized
            AppError::InvalidToken => {
                (StatusCode::UNAUTHORIZED, "invalid_token", None)
            }
            AppError::AccountDisabled => {
                (StatusCode::UNAUTHORIZED, "account_disabled", None)
            }

            // 403 Forbidden
            AppError::PermissionDenied => {
                (StatusCode::FORBIDDEN, "permission_denied", None)
            }
            AppError::Forbidden(msg) => {
                (StatusCode::FORBIDDEN, "forbidden", Some(msg.clone()))
            }

            // 404 Not Found
            AppError::BookNotFound(id) => {
                (StatusCode::NOT_FOUND, "book_not_found", Some(id.clone()))
            }
            AppError::AuthorNotFound(id) => {
                (StatusCode::NOT_FOUND, "author_not_found", Some(id.clone()))
            }
            AppError::GenreNotFound(id) => {
                (StatusCode::NOT_FOUND, "genre_not_found", Some(id.clone()))
            }
            AppError::ReaderNotFound(id) => {
                (StatusCode::NOT_FOUND, "reader_not_found", Some(id.clone()))
            }
            AppError::RentalNotFound(id) => {
                (StatusCode::NOT_FOUND, "rental_not_found", Some(id.clone()))
            }

            // 409 Conflict
            AppError::BookUnavailable => {
                (StatusCode::CONFLICT, "book_unavailable", None)
            }
            AppError::RentalAlreadyClosed => {
                (StatusCode::CONFLICT, "rental_already_closed", None)
            }

            // 500 Internal Server Error
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
            AppError::Config(e) => {
                tracing::error!("Config error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "config_error", None)
            }
        };

        let body = ErrorResponse {
            error: self.to_string(),
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}
