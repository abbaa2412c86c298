//! Admin API authentication.
//!
//! Admin routes accept `Authorization: Bearer <STOREFRONT_ADMIN_API_TOKEN>`.
//! Operator sessions are managed outside this service.

use axum::{extract::FromRequestParts, http::request::Parts};
use secrecy::ExposeSecret;

use crate::error::AppError;
use crate::services::verification::constant_time_eq;
use crate::state::AppState;

/// Extractor that requires the admin bearer token.
///
/// # Example
///
/// ```rust,ignore
/// async fn admin_handler(_admin: RequireAdmin) -> impl IntoResponse {
///     "ok"
/// }
/// ```
pub struct RequireAdmin;

/// Token from an `Authorization: Bearer` header value.
fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(bearer_token)
            .ok_or_else(|| AppError::Unauthorized("admin token required".to_string()))?;

        if !constant_time_eq(token, state.config().admin_api_token.expose_secret()) {
            tracing::warn!(path = %parts.uri.path(), "Rejected admin token");
            return Err(AppError::Unauthorized("invalid admin token".to_string()));
        }

        Ok(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token("Bearer abc123"), Some("abc123"));
        assert_eq!(bearer_token("bearer  abc123 "), Some("abc123"));
        assert_eq!(bearer_token("Basic abc123"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("abc123"), None);
    }
}
