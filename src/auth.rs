use axum::http::{header::AUTHORIZATION, HeaderMap};

use crate::error::AppError;

/// Checks the `Authorization: Bearer <token>` header against the configured
/// API token. Runs before any inference or storage work.
pub fn verify_token(headers: &HeaderMap, expected: &str) -> Result<(), AppError> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match token {
        Some(token) if token == expected => Ok(()),
        _ => Err(AppError::Unauthorized),
    }
}
