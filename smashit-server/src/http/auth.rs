//! Shared-secret authentication
//!
//! Every protected route requires the `x-api-key` header to equal the secret
//! the server was started with.

use std::fmt;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use super::error::ApiError;
use super::server::{AppState, ServerError};

pub const API_KEY_HEADER: &str = "x-api-key";

/// The configured secret. Never empty.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(Arc<str>);

impl ApiKey {
    pub fn new(key: impl AsRef<str>) -> Result<Self, ServerError> {
        let key = key.as_ref().trim();
        if key.is_empty() {
            return Err(ServerError::MissingApiKey);
        }
        Ok(Self(Arc::from(key)))
    }

    pub fn matches(&self, candidate: &str) -> bool {
        *self.0 == *candidate
    }
}

// Keep the secret out of logs and panics.
impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Reject the request with 401 unless it carries the right `x-api-key`.
pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let authorized = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|key| state.api_key.matches(key));

    if authorized {
        return Ok(next.run(req).await);
    }

    tracing::debug!(
        method = %req.method(),
        path = %req.uri().path(),
        "rejected request without valid api key"
    );
    Err(ApiError::Unauthorized)
}
