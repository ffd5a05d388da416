//! Desktop auth error type
//!
//! One error enum is shared by issuance, verification, session management
//! and the HTTP client so the same kinds surface on both sides of the wire.

use thiserror::Error;

/// Desktop auth service errors
#[derive(Debug, Error)]
pub enum DesktopAuthError {
    /// No web session, or the identity provider did not recognise it
    #[error("Unauthorized")]
    Unauthenticated,

    /// Input validation failed
    #[error("{0}")]
    BadRequest(String),

    /// Not a compact JWS
    #[error("Malformed token")]
    Malformed,

    /// Signature mismatch, wrong algorithm, or undecodable segment
    #[error("Invalid token")]
    InvalidSignature,

    #[error("Token expired")]
    Expired,

    /// Token checks out but its backing row is gone or belongs to someone else
    #[error("Session not found")]
    SessionNotFound,

    #[error("Not found")]
    NotFound,

    /// Store read/write failed
    #[error("Storage error: {0}")]
    Persistence(#[source] anyhow::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl DesktopAuthError {
    /// Stable identifier for logs and diagnostics
    pub fn code(&self) -> &'static str {
        match self {
            DesktopAuthError::Unauthenticated => "unauthenticated",
            DesktopAuthError::BadRequest(_) => "bad_request",
            DesktopAuthError::Malformed => "malformed",
            DesktopAuthError::InvalidSignature => "invalid_signature",
            DesktopAuthError::Expired => "expired",
            DesktopAuthError::SessionNotFound => "session_not_found",
            DesktopAuthError::NotFound => "not_found",
            DesktopAuthError::Persistence(_) => "persistence",
            DesktopAuthError::Internal(_) => "internal",
        }
    }

    /// Whether the failure is on the server side rather than the caller's
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            DesktopAuthError::Persistence(_) | DesktopAuthError::Internal(_)
        )
    }

    /// Map a wire message from a 401 response back to its error kind
    pub fn from_unauthorized_message(message: &str) -> Self {
        match message {
            "Malformed token" => DesktopAuthError::Malformed,
            "Invalid token" => DesktopAuthError::InvalidSignature,
            "Token expired" => DesktopAuthError::Expired,
            "Session not found" => DesktopAuthError::SessionNotFound,
            _ => DesktopAuthError::Unauthenticated,
        }
    }
}
