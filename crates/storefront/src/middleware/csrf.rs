//! Per-session CSRF tokens for state-changing cart requests.
//!
//! The token is created on first use, stored in the session and handed to
//! clients in the cart view. Mutating requests must echo it back in the
//! `x-csrf-token` header or the `_token` query parameter.

use axum::{
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use rand::{Rng, distr::Alphanumeric};
use serde::Deserialize;
use tower_sessions::Session;

use crate::error::AppError;
use crate::models::session_keys;

/// Header carrying the CSRF token.
pub const CSRF_HEADER: &str = "x-csrf-token";

const TOKEN_LENGTH: usize = 40;

fn generate_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Return the session's CSRF token, creating one if needed.
///
/// # Errors
///
/// Returns the session error if the token cannot be read or stored.
pub async fn csrf_token(session: &Session) -> Result<String, tower_sessions::session::Error> {
    if let Some(token) = session.get::<String>(session_keys::CSRF_TOKEN).await? {
        return Ok(token);
    }

    let token = generate_token();
    session.insert(session_keys::CSRF_TOKEN, &token).await?;
    Ok(token)
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    #[serde(rename = "_token")]
    token: Option<String>,
}

fn submitted_token(parts: &Parts) -> Option<String> {
    if let Some(value) = parts.headers.get(CSRF_HEADER) {
        return value.to_str().ok().map(String::from);
    }

    Query::<TokenQuery>::try_from_uri(&parts.uri)
        .ok()
        .and_then(|Query(q)| q.token)
}

/// Compare tokens without short-circuiting on the first differing byte.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Extractor that rejects the request with 403 unless it carries the
/// session's CSRF token.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(_csrf: RequireCsrf, session: Session) -> impl IntoResponse {
///     // token already verified
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RequireCsrf;

impl<S> FromRequestParts<S> for RequireCsrf
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::Internal("session layer missing".to_string()))?;

        let expected = session.get::<String>(session_keys::CSRF_TOKEN).await?;

        match (expected, submitted_token(parts)) {
            (Some(expected), Some(submitted)) if constant_time_eq(&expected, &submitted) => {
                Ok(Self)
            }
            _ => {
                tracing::warn!(path = %parts.uri.path(), "rejected request with invalid CSRF token");
                Err(AppError::Forbidden("invalid CSRF token".to_string()))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(uri: &str, header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri(uri);
        if let Some(value) = header {
            builder = builder.header(CSRF_HEADER, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_generated_tokens_are_alphanumeric_and_distinct() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), TOKEN_LENGTH);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_submitted_token_from_header() {
        let parts = parts("/cart/up/10", Some("abc"));
        assert_eq!(submitted_token(&parts).as_deref(), Some("abc"));
    }

    #[test]
    fn test_submitted_token_from_query() {
        let parts = parts("/cart/up/10?_token=xyz", None);
        assert_eq!(submitted_token(&parts).as_deref(), Some("xyz"));
    }

    #[test]
    fn test_submitted_token_missing() {
        let parts = parts("/cart/up/10", None);
        assert_eq!(submitted_token(&parts), None);
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("token", "token"));
        assert!(constant_time_eq("", ""));
        assert!(!constant_time_eq("token", "tokem"));
        assert!(!constant_time_eq("token", "toke"));
        assert!(!constant_time_eq("token", "tokens"));
    }
}
