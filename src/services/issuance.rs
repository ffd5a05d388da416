//! Desktop token issuance
//!
//! Exchanges an authenticated web session for a desktop token plus its
//! stored session row. A token is only returned once its row is written.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::identity::{authenticate, IdentityProvider};
use super::token::TokenCodec;
use super::DesktopAuthError;
use crate::db::repositories::DesktopSessionRepository;
use crate::models::{AuthenticatedUser, NewDesktopSession, DEFAULT_APP_ID, MAX_APP_ID_LEN};

/// Result of a successful issuance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: AuthenticatedUser,
}

/// Anything that can turn a web session into a desktop token
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    async fn issue_token(
        &self,
        access_token: &str,
        app_id: Option<&str>,
    ) -> Result<IssuedToken, DesktopAuthError>;
}

/// Normalise the caller-supplied app id
pub fn normalize_app_id(app_id: Option<&str>) -> Result<String, DesktopAuthError> {
    match app_id {
        None => Ok(DEFAULT_APP_ID.to_string()),
        Some(id) if id.trim().is_empty() => Ok(DEFAULT_APP_ID.to_string()),
        Some(id) if id.chars().count() > MAX_APP_ID_LEN => Err(DesktopAuthError::BadRequest(
            format!("app_id must be at most {} characters", MAX_APP_ID_LEN),
        )),
        Some(id) => Ok(id.to_string()),
    }
}

/// Issuance service
pub struct IssuanceService {
    identity: Arc<dyn IdentityProvider>,
    codec: TokenCodec,
    sessions: Arc<dyn DesktopSessionRepository>,
}

impl IssuanceService {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        codec: TokenCodec,
        sessions: Arc<dyn DesktopSessionRepository>,
    ) -> Self {
        Self {
            identity,
            codec,
            sessions,
        }
    }

    /// Authenticate the bearer, then issue for that user
    pub async fn issue(
        &self,
        access_token: Option<&str>,
        app_id: Option<&str>,
    ) -> Result<IssuedToken, DesktopAuthError> {
        let user = authenticate(self.identity.as_ref(), access_token)
            .await
            .inspect_err(|e| warn!(code = e.code(), "Desktop token request not authenticated"))?;

        self.issue_for(&user, app_id).await
    }

    /// Issue for an already authenticated user
    pub async fn issue_for(
        &self,
        user: &AuthenticatedUser,
        app_id: Option<&str>,
    ) -> Result<IssuedToken, DesktopAuthError> {
        let app_id = normalize_app_id(app_id)?;
        let minted = self.codec.mint(&user.id, &user.email, &app_id)?;

        let input = NewDesktopSession {
            user_id: user.id.clone(),
            app_id: app_id.clone(),
            jwt_token: minted.token.clone(),
            issued_at: minted.issued_at,
            expires_at: minted.expires_at,
        };

        let session = self.sessions.insert(&input).await.map_err(|e| {
            warn!(user_id = %user.id, app_id = %app_id, error = %e, "Failed to store desktop session");
            DesktopAuthError::Persistence(e)
        })?;

        info!(
            user_id = %user.id,
            app_id = %app_id,
            session_id = %session.id,
            "Issued desktop token"
        );

        Ok(IssuedToken {
            token: minted.token,
            expires_at: minted.expires_at,
            user: user.clone(),
        })
    }
}

#[async_trait]
impl TokenIssuer for IssuanceService {
    async fn issue_token(
        &self,
        access_token: &str,
        app_id: Option<&str>,
    ) -> Result<IssuedToken, DesktopAuthError> {
        self.issue(Some(access_token), app_id).await
    }
}
