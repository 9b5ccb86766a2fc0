//! Request admission checks for the API routes
//!
//! Runs before any handler: the API key is checked first (403), then the
//! content type (400).

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use super::error::ApiError;

/// Header carrying the shared API key
pub const API_KEY_HEADER: &str = "x-statusthing-key";

const JSON_CONTENT_TYPE: &str = "application/json";

/// Middleware state enforcing the API key and JSON content type
///
/// Apply with `axum::middleware::from_fn_with_state(guard, RequestGuard::middleware)`.
#[derive(Debug, Clone, Default)]
pub struct RequestGuard {
    api_key: Option<Arc<str>>,
}

impl RequestGuard {
    /// Create a guard; `None` disables the API key check
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key: api_key.map(Arc::from),
        }
    }

    /// Middleware function for axum
    pub async fn middleware(
        State(guard): State<Self>,
        request: Request,
        next: Next,
    ) -> Result<Response, ApiError> {
        guard.check(request.headers())?;
        Ok(next.run(request).await)
    }

    /// Validate request headers
    pub fn check(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        if let Some(expected) = self.api_key.as_deref() {
            let provided = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok());
            if provided != Some(expected) {
                tracing::debug!("rejecting request with missing or invalid api key");
                return Err(ApiError::forbidden("missing or invalid api key"));
            }
        }

        let is_json = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(is_json_media_type)
            .unwrap_or(false);
        if !is_json {
            return Err(ApiError::bad_request(format!(
                "content-type must be {}",
                JSON_CONTENT_TYPE
            )));
        }

        Ok(())
    }
}

/// `application/json`, optionally followed by parameters such as a charset
fn is_json_media_type(value: &str) -> bool {
    value
        .split(';')
        .next()
        .map(|media| media.trim().eq_ignore_ascii_case(JSON_CONTENT_TYPE))
        .unwrap_or(false)
}
