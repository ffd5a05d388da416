//! Background job: delete expired desktop sessions.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time;

use super::DesktopSessionService;

/// Spawn the recurring cleanup task. Returns `None` when `every` is zero.
pub fn spawn(service: Arc<DesktopSessionService>, every: Duration) -> Option<JoinHandle<()>> {
    if every.is_zero() {
        tracing::info!("Expired session cleanup disabled");
        return None;
    }

    Some(tokio::spawn(async move {
        let mut interval = time::interval(every);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            run_once(&service).await;
        }
    }))
}

/// Run one cleanup pass, logging the outcome
pub async fn run_once(service: &DesktopSessionService) -> u64 {
    match service.cleanup_expired(Utc::now()).await {
        Ok(removed) => {
            if removed > 0 {
                tracing::info!(rows = removed, "Deleted expired desktop sessions");
            }
            removed
        }
        Err(e) => {
            tracing::error!("Desktop session cleanup failed: {}", e);
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::DesktopSessionRepository;
    use crate::models::NewDesktopSession;
    use crate::services::issuance::test_support::setup_repo;
    use chrono::SubsecRound;

    async fn service_with_expired_row() -> Arc<DesktopSessionService> {
        let repo = setup_repo().await;
        let issued_at = (Utc::now() - chrono::Duration::hours(48)).trunc_subsecs(0);
        repo.insert(&NewDesktopSession {
            user_id: "u1".to_string(),
            app_id: "default".to_string(),
            jwt_token: "stale-token".to_string(),
            issued_at,
            expires_at: issued_at + chrono::Duration::hours(24),
        })
        .await
        .unwrap();
        Arc::new(DesktopSessionService::new(repo))
    }

    #[tokio::test]
    async fn test_zero_interval_disables_job() {
        let service = service_with_expired_row().await;

        assert!(spawn(service, Duration::ZERO).is_none());
    }

    #[tokio::test]
    async fn test_run_once_removes_expired_rows() {
        let service = service_with_expired_row().await;

        assert_eq!(run_once(&service).await, 1);
        assert_eq!(run_once(&service).await, 0);
    }

    #[tokio::test]
    async fn test_spawned_job_runs_immediately() {
        let service = service_with_expired_row().await;

        let handle = spawn(service.clone(), Duration::from_secs(3600)).unwrap();
        for _ in 0..50 {
            if service.list_for_user("u1").await.unwrap().is_empty() {
                break;
            }
            time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();

        assert!(service.list_for_user("u1").await.unwrap().is_empty());
    }
}
