use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use secrecy::ExposeSecret;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::api::state::AppState;
use crate::error::AppError;

/// Middleware that requires `Authorization: Bearer <API_TOKEN>`
pub async fn require_api_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !has_valid_token(request.headers(), state.config.api_token.expose_secret()) {
        tracing::warn!(path = %request.uri().path(), "Rejected API request without valid token");
        return Err(AppError::Unauthorized);
    }

    Ok(next.run(request).await)
}

fn has_valid_token(headers: &HeaderMap, expected: &str) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| constant_time_eq(token.trim().as_bytes(), expected.as_bytes()))
        .unwrap_or(false)
}

/// Compares secrets in constant time
///
/// Both inputs are hashed to fixed-length SHA-256 digests first, so neither
/// the content nor the length of the expected secret shows in the timing.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let digest_a = Sha256::digest(a);
    let digest_b = Sha256::digest(b);
    digest_a.ct_eq(&digest_b).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_valid_token() {
        assert!(has_valid_token(&headers("Bearer s3cret"), "s3cret"));
    }

    #[test]
    fn test_invalid_tokens() {
        assert!(!has_valid_token(&headers("Bearer wrong"), "s3cret"));
        assert!(!has_valid_token(&headers("s3cret"), "s3cret"));
        assert!(!has_valid_token(&HeaderMap::new(), "s3cret"));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"", b"abc"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn test_constant_time_eq_rejects_prefixes_and_extensions() {
        // Length differences go through the same digest comparison
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(!constant_time_eq(b"s3cret-and-more", b"s3cret"));
        assert!(!has_valid_token(&headers("Bearer s3cre"), "s3cret"));
        assert!(!has_valid_token(&headers("Bearer s3cret0"), "s3cret"));
    }

    #[tokio::test]
    async fn test_api_routes_reject_missing_or_wrong_token() {
        use crate::api::{protected_router, state::test_support::lazy_state};
        use axum::{body::Body, http::StatusCode, Router};
        use tower::ServiceExt;

        let state = lazy_state(None);
        let app: Router = protected_router(state.clone()).with_state(state);

        let cases = [
            ("GET", "/api/alerts", None),
            ("GET", "/api/sales/retail/export", Some("Bearer wrong")),
            ("DELETE", "/api/products/R-1", Some("Basic s3cret")),
            ("GET", "/api/bot-users", None),
        ];
        for (method, uri, authorization) in cases {
            let mut request = axum::http::Request::builder().method(method).uri(uri);
            if let Some(value) = authorization {
                request = request.header(header::AUTHORIZATION, value);
            }

            let response = app
                .clone()
                .oneshot(request.body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }
    }
}
