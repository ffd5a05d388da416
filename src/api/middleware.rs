//! API middleware
//!
//! Contains:
//! - Shared application state
//! - The JSON error type returned by every handler
//! - Bearer authentication against the identity provider

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::services::{
    authenticate, DesktopAuthError, DesktopSessionService, IdentityProvider, IssuanceService,
    VerificationService,
};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub identity: Arc<dyn IdentityProvider>,
    pub issuance: Arc<IssuanceService>,
    pub verification: Arc<VerificationService>,
    pub sessions: Arc<DesktopSessionService>,
}

/// Error body returned to clients
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Error response for API errors
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn internal_error() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }
}

impl From<DesktopAuthError> for ApiError {
    fn from(err: DesktopAuthError) -> Self {
        match err {
            DesktopAuthError::BadRequest(message) => ApiError::bad_request(message),
            DesktopAuthError::Unauthenticated
            | DesktopAuthError::Malformed
            | DesktopAuthError::InvalidSignature
            | DesktopAuthError::Expired
            | DesktopAuthError::SessionNotFound => ApiError::unauthorized(err.to_string()),
            DesktopAuthError::NotFound => ApiError::new(StatusCode::NOT_FOUND, err.to_string()),
            DesktopAuthError::Persistence(_) | DesktopAuthError::Internal(_) => {
                tracing::error!(code = err.code(), "Request failed: {:#}", err);
                ApiError::internal_error()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

/// Extract the bearer token from the Authorization header
pub fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Authentication middleware
///
/// Resolves the web session and stores the `AuthenticatedUser` in the
/// request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer = extract_bearer(request.headers());
    let user = authenticate(state.identity.as_ref(), bearer.as_deref()).await?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_bearer() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(extract_bearer(&headers).as_deref(), Some("abc"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(extract_bearer(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_bearer(&headers), None);
    }

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (DesktopAuthError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (DesktopAuthError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (DesktopAuthError::Malformed, StatusCode::UNAUTHORIZED),
            (DesktopAuthError::InvalidSignature, StatusCode::UNAUTHORIZED),
            (DesktopAuthError::Expired, StatusCode::UNAUTHORIZED),
            (DesktopAuthError::SessionNotFound, StatusCode::UNAUTHORIZED),
            (DesktopAuthError::NotFound, StatusCode::NOT_FOUND),
            (
                DesktopAuthError::Persistence(anyhow::anyhow!("db down")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err = ApiError::from(DesktopAuthError::Internal(anyhow::anyhow!("password=hunter2")));

        assert_eq!(err.message, "Internal server error");
    }
}
