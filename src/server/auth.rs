//! Operator authentication
//!
//! Login flows live outside this service. All the router needs to know is
//! whether a request is allowed to touch the operator endpoints.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use subtle::ConstantTimeEq;

use super::error::AppError;
use super::SharedState;

/// Decides whether a request comes from an authenticated operator
pub trait Authenticator: Send + Sync {
    fn is_authenticated(&self, headers: &HeaderMap) -> bool;
}

/// Lets every request through
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAccess;

impl Authenticator for OpenAccess {
    fn is_authenticated(&self, _headers: &HeaderMap) -> bool {
        true
    }
}

/// Accepts requests carrying `Authorization: Bearer <token>`
#[derive(Debug, Clone)]
pub struct BearerToken {
    token: String,
}

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl Authenticator for BearerToken {
    fn is_authenticated(&self, headers: &HeaderMap) -> bool {
        headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .is_some_and(|presented| {
                presented
                    .trim()
                    .as_bytes()
                    .ct_eq(self.token.as_bytes())
                    .into()
            })
    }
}

/// Picks the authenticator for the configured operator token
///
/// No token (or a blank one) means open access.
pub fn from_token(token: Option<&str>) -> Arc<dyn Authenticator> {
    match token.map(str::trim).filter(|token| !token.is_empty()) {
        Some(token) => Arc::new(BearerToken::new(token)),
        None => {
            tracing::warn!("no operator token configured, operator endpoints are open");
            Arc::new(OpenAccess)
        }
    }
}

/// Route layer rejecting unauthenticated requests with 401
pub async fn require_operator(
    State(state): State<SharedState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !state.auth.is_authenticated(request.headers()) {
        return Err(AppError::Unauthorized);
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(auth: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(auth).unwrap());
        headers
    }

    #[test]
    fn test_open_access_allows_anything() {
        assert!(OpenAccess.is_authenticated(&HeaderMap::new()));
    }

    #[test]
    fn test_bearer_token_accepts_matching_token() {
        let auth = BearerToken::new("s3cret");
        assert!(auth.is_authenticated(&headers_with("Bearer s3cret")));
    }

    #[test]
    fn test_bearer_token_rejects_missing_or_wrong_token() {
        let auth = BearerToken::new("s3cret");
        assert!(!auth.is_authenticated(&HeaderMap::new()));
        assert!(!auth.is_authenticated(&headers_with("Bearer nope")));
        assert!(!auth.is_authenticated(&headers_with("Basic s3cret")));
        assert!(!auth.is_authenticated(&headers_with("s3cret")));
    }

    #[test]
    fn test_bearer_token_rejects_prefixes_and_extensions() {
        let auth = BearerToken::new("s3cret");
        assert!(!auth.is_authenticated(&headers_with("Bearer s3cre")));
        assert!(!auth.is_authenticated(&headers_with("Bearer s3cret2")));
        assert!(!auth.is_authenticated(&headers_with("Bearer ")));
        assert!(!auth.is_authenticated(&headers_with("Bearer S3CRET")));
    }

    #[test]
    fn test_from_token_blank_means_open() {
        assert!(from_token(None).is_authenticated(&HeaderMap::new()));
        assert!(from_token(Some("   ")).is_authenticated(&HeaderMap::new()));
        assert!(!from_token(Some("tok")).is_authenticated(&HeaderMap::new()));
    }
}
