//! API Middleware
//!
//! Caller resolution and request logging.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::Caller;
use crate::error::AppError;

// =========================================================================
// Caller resolution
// =========================================================================

/// Resolve the caller from an optional `Authorization: Bearer` token.
///
/// A missing header yields an anonymous caller; the policy layer decides
/// what anonymous callers may do. A present but unknown or expired token is
/// rejected outright, through [`AppError`] so rejections share the one
/// response shape. Token digests are compared in SQL so the raw token
/// never touches a table.
pub async fn auth_middleware(
    State(pool): State<PgPool>,
    headers: HeaderMap,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let token = headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let caller = match token {
        None => Caller::anonymous(),
        Some(token) => {
            let row: Option<(Uuid, bool, bool, bool, bool)> = match sqlx::query_as(
                r#"
                SELECT u.id,
                       u.is_active,
                       u.is_staff,
                       u.is_superuser,
                       EXISTS (
                           SELECT 1 FROM user_groups g
                           WHERE g.user_id = u.id AND g.group_name = 'librarians'
                       ) AS is_librarian
                FROM auth_tokens t
                JOIN users u ON u.id = t.user_id
                WHERE t.token_hash = encode(sha256($1::bytea), 'hex')
                  AND (t.expires_at IS NULL OR t.expires_at > NOW())
                "#,
            )
            .bind(token.as_bytes())
            .fetch_optional(&pool)
            .await
            {
                Ok(row) => row,
                Err(e) => return Err(AppError::Database(e).into_response()),
            };

            let (user_id, is_active, is_staff, is_superuser, is_librarian) = match row {
                Some(row) => row,
                None => return Err(AppError::InvalidToken.into_response()),
            };

            if !is_active {
                return Err(AppError::AccountDisabled.into_response());
            }

            Caller {
                user_id: Some(user_id),
                is_librarian,
                is_admin: is_staff || is_superuser,
            }
        }
    };

    request.extensions_mut().insert(caller);

    Ok(next.run(request).await)
}

// =========================================================================
// Header masking
// =========================================================================

/// Headers that should be masked in logs
const SENSITIVE_HEADERS: &[&str] = &["authorization", "cookie", "set-cookie"];

/// Mask sensitive headers for logging
pub fn mask_headers_for_logging(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let name_lower = name.as_str().to_lowercase();
            let masked_value = if SENSITIVE_HEADERS.contains(&name_lower.as_str()) {
                "[REDACTED]".to_string()
            } else {
                value.to_str().unwrap_or("[invalid utf8]").to_string()
            };
            (name.to_string(), masked_value)
        })
        .collect()
}

// =========================================================================
// Request logging
// =========================================================================

/// Request logging middleware
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let headers = mask_headers_for_logging(request.headers());

    let start = std::time::Instant::now();

    tracing::info!(
        method = %method,
        uri = %uri,
        headers = ?headers,
        "Incoming request"
    );

    let response = next.run(request).await;

    let duration = start.elapsed();
    let status = response.status();

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %status,
        duration_ms = %duration.as_millis(),
        "Request completed"
    );

    response
}
