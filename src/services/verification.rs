//! Desktop token verification
//!
//! A token is accepted only if its signature checks out, it has not
//! expired, and its stored row still exists for the same user.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::token::TokenCodec;
use super::DesktopAuthError;
use crate::db::repositories::DesktopSessionRepository;
use crate::models::AuthenticatedUser;

/// Identity bound to a verified token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedToken {
    pub user: AuthenticatedUser,
    pub app_id: String,
}

/// Verification service
pub struct VerificationService {
    codec: TokenCodec,
    sessions: Arc<dyn DesktopSessionRepository>,
}

impl VerificationService {
    pub fn new(codec: TokenCodec, sessions: Arc<dyn DesktopSessionRepository>) -> Self {
        Self { codec, sessions }
    }

    pub async fn verify(&self, token: &str) -> Result<VerifiedToken, DesktopAuthError> {
        let result = self.verify_inner(token).await;
        match &result {
            Ok(verified) => info!(
                user_id = %verified.user.id,
                app_id = %verified.app_id,
                "Verified desktop token"
            ),
            Err(e) if e.is_internal() => warn!(code = e.code(), error = %e, "Desktop token verification failed"),
            Err(e) => debug!(code = e.code(), "Desktop token rejected"),
        }
        result
    }

    async fn verify_inner(&self, token: &str) -> Result<VerifiedToken, DesktopAuthError> {
        if token.trim().is_empty() {
            return Err(DesktopAuthError::BadRequest("Token is required".to_string()));
        }

        let claims = self.codec.check(token)?;

        let session = self
            .sessions
            .find_by_token(token)
            .await
            .map_err(DesktopAuthError::Persistence)?
            .filter(|s| s.user_id == claims.sub)
            .ok_or(DesktopAuthError::SessionNotFound)?;

        let now = Utc::now();
        if session.is_expired_at(now) {
            return Err(DesktopAuthError::Expired);
        }

        // Revoked between the lookup and the update.
        let marked = self
            .sessions
            .mark_used(&session.id, now.max(session.created_at))
            .await
            .map_err(DesktopAuthError::Persistence)?;
        if !marked {
            return Err(DesktopAuthError::SessionNotFound);
        }

        Ok(VerifiedToken {
            user: AuthenticatedUser::new(claims.sub, claims.email),
            app_id: session.app_id,
        })
    }
}
