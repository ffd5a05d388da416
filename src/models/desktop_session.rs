//! Desktop session model
//!
//! A desktop session is the durable record behind an issued desktop token.
//! The token alone is not enough to authenticate: the row must still exist
//! (deleting it revokes the token) and must not have expired.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// App identifier used when the caller does not name one
pub const DEFAULT_APP_ID: &str = "default";

/// Longest accepted app identifier
pub const MAX_APP_ID_LEN: usize = 128;

/// Fixed lifetime of a desktop token, in hours
const DESKTOP_SESSION_TTL_HOURS: i64 = 24;

/// Fixed lifetime of a desktop token
pub fn desktop_session_ttl() -> Duration {
    Duration::hours(DESKTOP_SESSION_TTL_HOURS)
}

/// Persisted desktop credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DesktopSession {
    /// Row identifier (UUID v4)
    pub id: String,
    /// Owning identity in the external auth service
    pub user_id: String,
    /// Desktop application instance that requested pairing
    pub app_id: String,
    /// The signed token handed to the desktop client
    #[serde(skip_serializing)]
    pub jwt_token: String,
    /// Issuance time (the token's `iat`)
    pub created_at: DateTime<Utc>,
    /// Absolute expiry (`created_at` + 24h)
    pub expires_at: DateTime<Utc>,
    /// Last successful verification, if any
    pub used_at: Option<DateTime<Utc>>,
}

impl DesktopSession {
    /// Check expiry against a given instant
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Dashboard status of this session
    pub fn status_at(&self, now: DateTime<Utc>) -> DesktopSessionStatus {
        if self.is_expired_at(now) {
            DesktopSessionStatus::Expired
        } else {
            DesktopSessionStatus::Active
        }
    }
}

/// Values needed to insert a new desktop session row
#[derive(Debug, Clone)]
pub struct NewDesktopSession {
    pub user_id: String,
    pub app_id: String,
    pub jwt_token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Whether a session can still be used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DesktopSessionStatus {
    Active,
    Expired,
}

impl fmt::Display for DesktopSessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DesktopSessionStatus::Active => write!(f, "active"),
            DesktopSessionStatus::Expired => write!(f, "expired"),
        }
    }
}
