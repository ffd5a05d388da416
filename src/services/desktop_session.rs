//! Desktop session management
//!
//! Listing and revocation of a user's desktop sessions, plus expiry cleanup.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use super::DesktopAuthError;
use crate::db::repositories::DesktopSessionRepository;
use crate::models::DesktopSession;

/// Desktop session service
pub struct DesktopSessionService {
    sessions: Arc<dyn DesktopSessionRepository>,
}

impl DesktopSessionService {
    pub fn new(sessions: Arc<dyn DesktopSessionRepository>) -> Self {
        Self { sessions }
    }

    /// All sessions of a user, newest first
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<DesktopSession>, DesktopAuthError> {
        self.sessions
            .find_by_user(user_id)
            .await
            .map_err(DesktopAuthError::Persistence)
    }

    /// Revoke one of the caller's sessions
    ///
    /// Returns `NotFound` both when the row is gone and when it belongs to
    /// another user.
    pub async fn revoke(&self, user_id: &str, id: &str) -> Result<(), DesktopAuthError> {
        let session = self
            .sessions
            .find_by_id(id)
            .await
            .map_err(DesktopAuthError::Persistence)?
            .filter(|s| s.user_id == user_id)
            .ok_or(DesktopAuthError::NotFound)?;

        let deleted = self
            .sessions
            .delete(&session.id)
            .await
            .map_err(DesktopAuthError::Persistence)?;

        if !deleted {
            return Err(DesktopAuthError::NotFound);
        }

        info!(user_id = %user_id, session_id = %id, app_id = %session.app_id, "Revoked desktop session");
        Ok(())
    }

    /// Delete sessions that expired before `before`
    pub async fn cleanup_expired(&self, before: DateTime<Utc>) -> Result<u64, DesktopAuthError> {
        self.sessions
            .delete_expired(before)
            .await
            .map_err(DesktopAuthError::Persistence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::issuance::test_support::*;
    use crate::models::NewDesktopSession;
    use chrono::{Duration, SubsecRound};

    #[tokio::test]
    async fn test_list_for_user_only_returns_own_sessions() {
        let repo = setup_repo().await;
        let issuer = issuance(repo.clone());
        issuer.issue(Some("web-session"), Some("ide-plugin")).await.unwrap();
        issuer.issue(Some("other-session"), None).await.unwrap();

        let service = DesktopSessionService::new(repo);
        let sessions = service.list_for_user("u1").await.unwrap();

        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].app_id, "ide-plugin");
    }

    #[tokio::test]
    async fn test_revoke_own_session() {
        let repo = setup_repo().await;
        let issued = issuance(repo.clone()).issue(Some("web-session"), None).await.unwrap();
        let row = repo.find_by_token(&issued.token).await.unwrap().unwrap();

        let service = DesktopSessionService::new(repo.clone());
        service.revoke("u1", &row.id).await.unwrap();

        assert!(repo.find_by_id(&row.id).await.unwrap().is_none());
        assert!(matches!(
            service.revoke("u1", &row.id).await,
            Err(DesktopAuthError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_revoke_foreign_session_is_not_found() {
        let repo = setup_repo().await;
        let issued = issuance(repo.clone()).issue(Some("web-session"), None).await.unwrap();
        let row = repo.find_by_token(&issued.token).await.unwrap().unwrap();

        let service = DesktopSessionService::new(repo.clone());

        assert!(matches!(
            service.revoke("u2", &row.id).await,
            Err(DesktopAuthError::NotFound)
        ));
        assert!(repo.find_by_id(&row.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let repo = setup_repo().await;
        let issued_at = (Utc::now() - Duration::hours(48)).trunc_subsecs(0);
        repo.insert(&NewDesktopSession {
            user_id: "u1".to_string(),
            app_id: "default".to_string(),
            jwt_token: "stale-token".to_string(),
            issued_at,
            expires_at: issued_at + Duration::hours(24),
        })
        .await
        .unwrap();
        issuance(repo.clone()).issue(Some("web-session"), None).await.unwrap();

        let service = DesktopSessionService::new(repo.clone());
        let removed = service.cleanup_expired(Utc::now()).await.unwrap();

        assert_eq!(removed, 1);
        assert_eq!(service.list_for_user("u1").await.unwrap().len(), 1);
    }
}
