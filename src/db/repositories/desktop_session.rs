//! Desktop session repository
//!
//! Database operations for issued desktop credentials.
//!
//! This module provides:
//! - `DesktopSessionRepository` trait defining the interface for session data access
//! - `SqlxDesktopSessionRepository` implementing the trait for SQLite and MySQL
//!
//! The store is append-only for inserts; the only mutation is `used_at`, and
//! rows leave the table by revocation or by expiry cleanup.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{DesktopSession, NewDesktopSession};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;

/// Desktop session repository trait
#[async_trait]
pub trait DesktopSessionRepository: Send + Sync {
    /// Insert a new session row
    async fn insert(&self, session: &NewDesktopSession) -> Result<DesktopSession>;

    /// Get session by row ID
    async fn find_by_id(&self, id: &str) -> Result<Option<DesktopSession>>;

    /// Get session by its signed token
    async fn find_by_token(&self, token: &str) -> Result<Option<DesktopSession>>;

    /// All sessions of a user, newest first
    async fn find_by_user(&self, user_id: &str) -> Result<Vec<DesktopSession>>;

    /// Set `used_at` (last write wins). Returns `false` if no row matched.
    async fn mark_used(&self, id: &str, used_at: DateTime<Utc>) -> Result<bool>;

    /// Delete a session. Returns `false` if no row matched.
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Delete every session whose `expires_at` is before `before`
    async fn delete_expired(&self, before: DateTime<Utc>) -> Result<u64>;
}

/// SQLx-based desktop session repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxDesktopSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxDesktopSessionRepository {
    /// Create a new SQLx desktop session repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn DesktopSessionRepository> {
        Arc::new(Self::new(pool))
    }

    fn sqlite(&self) -> Result<&SqlitePool> {
        self.pool
            .as_sqlite()
            .context("Database pool is not a SQLite pool")
    }

    fn mysql(&self) -> Result<&MySqlPool> {
        self.pool
            .as_mysql()
            .context("Database pool is not a MySQL pool")
    }
}

#[async_trait]
impl DesktopSessionRepository for SqlxDesktopSessionRepository {
    async fn insert(&self, session: &NewDesktopSession) -> Result<DesktopSession> {
        let row = DesktopSession {
            id: Uuid::new_v4().to_string(),
            user_id: session.user_id.clone(),
            app_id: session.app_id.clone(),
            jwt_token: session.jwt_token.clone(),
            created_at: session.issued_at,
            expires_at: session.expires_at,
            used_at: None,
        };

        match self.pool.driver() {
            DatabaseDriver::Sqlite => insert_sqlite(self.sqlite()?, &row).await?,
            DatabaseDriver::Mysql => insert_mysql(self.mysql()?, &row).await?,
        }

        Ok(row)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<DesktopSession>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => find_by_id_sqlite(self.sqlite()?, id).await,
            DatabaseDriver::Mysql => find_by_id_mysql(self.mysql()?, id).await,
        }
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<DesktopSession>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => find_by_token_sqlite(self.sqlite()?, token).await,
            DatabaseDriver::Mysql => find_by_token_mysql(self.mysql()?, token).await,
        }
    }

    async fn find_by_user(&self, user_id: &str) -> Result<Vec<DesktopSession>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => find_by_user_sqlite(self.sqlite()?, user_id).await,
            DatabaseDriver::Mysql => find_by_user_mysql(self.mysql()?, user_id).await,
        }
    }

    async fn mark_used(&self, id: &str, used_at: DateTime<Utc>) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => mark_used_sqlite(self.sqlite()?, id, used_at).await,
            DatabaseDriver::Mysql => mark_used_mysql(self.mysql()?, id, used_at).await,
        }
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => delete_sqlite(self.sqlite()?, id).await,
            DatabaseDriver::Mysql => delete_mysql(self.mysql()?, id).await,
        }
    }

    async fn delete_expired(&self, before: DateTime<Utc>) -> Result<u64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => delete_expired_sqlite(self.sqlite()?, before).await,
            DatabaseDriver::Mysql => delete_expired_mysql(self.mysql()?, before).await,
        }
    }
}

const SELECT_COLUMNS: &str =
    "SELECT id, user_id, app_id, jwt_token, created_at, expires_at, used_at FROM desktop_sessions";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn insert_sqlite(pool: &SqlitePool, session: &DesktopSession) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO desktop_sessions (id, user_id, app_id, jwt_token, created_at, expires_at, used_at)
        VALUES (?, ?, ?, ?, ?, ?, NULL)
        "#,
    )
    .bind(&session.id)
    .bind(&session.user_id)
    .bind(&session.app_id)
    .bind(&session.jwt_token)
    .bind(session.created_at)
    .bind(session.expires_at)
    .execute(pool)
    .await
    .context("Failed to insert desktop session")?;

    Ok(())
}

async fn find_by_id_sqlite(pool: &SqlitePool, id: &str) -> Result<Option<DesktopSession>> {
    let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get desktop session by ID")?;

    Ok(row.as_ref().map(row_to_session_sqlite))
}

async fn find_by_token_sqlite(pool: &SqlitePool, token: &str) -> Result<Option<DesktopSession>> {
    let row = sqlx::query(&format!("{} WHERE jwt_token = ?", SELECT_COLUMNS))
        .bind(token)
        .fetch_optional(pool)
        .await
        .context("Failed to get desktop session by token")?;

    Ok(row.as_ref().map(row_to_session_sqlite))
}

async fn find_by_user_sqlite(pool: &SqlitePool, user_id: &str) -> Result<Vec<DesktopSession>> {
    let rows = sqlx::query(&format!(
        "{} WHERE user_id = ? ORDER BY created_at DESC, id DESC",
        SELECT_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("Failed to list desktop sessions")?;

    Ok(rows.iter().map(row_to_session_sqlite).collect())
}

async fn mark_used_sqlite(pool: &SqlitePool, id: &str, used_at: DateTime<Utc>) -> Result<bool> {
    let result = sqlx::query("UPDATE desktop_sessions SET used_at = ? WHERE id = ?")
        .bind(used_at)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to mark desktop session as used")?;

    Ok(result.rows_affected() > 0)
}

async fn delete_sqlite(pool: &SqlitePool, id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM desktop_sessions WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete desktop session")?;

    Ok(result.rows_affected() > 0)
}

async fn delete_expired_sqlite(pool: &SqlitePool, before: DateTime<Utc>) -> Result<u64> {
    let result = sqlx::query("DELETE FROM desktop_sessions WHERE expires_at < ?")
        .bind(before)
        .execute(pool)
        .await
        .context("Failed to delete expired desktop sessions")?;

    Ok(result.rows_affected())
}

fn row_to_session_sqlite(row: &sqlx::sqlite::SqliteRow) -> DesktopSession {
    DesktopSession {
        id: row.get("id"),
        user_id: row.get("user_id"),
        app_id: row.get("app_id"),
        jwt_token: row.get("jwt_token"),
        created_at: row.get("created_at"),
        expires_at: row.get("expires_at"),
        used_at: row.get("used_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn insert_mysql(pool: &MySqlPool, session: &DesktopSession) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO desktop_sessions (id, user_id, app_id, jwt_token, created_at, expires_at, used_at)
        VALUES (?, ?, ?, ?, ?, ?, NULL)
        "#,
    )
    .bind(&session.id)
    .bind(&session.user_id)
    .bind(&session.app_id)
    .bind(&session.jwt_token)
    .bind(session.created_at)
    .bind(session.expires_at)
    .execute(pool)
    .await
    .context("Failed to insert desktop session")?;

    Ok(())
}

async fn find_by_id_mysql(pool: &MySqlPool, id: &str) -> Result<Option<DesktopSession>> {
    let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get desktop session by ID")?;

    Ok(row.as_ref().map(row_to_session_mysql))
}

async fn find_by_token_mysql(pool: &MySqlPool, token: &str) -> Result<Option<DesktopSession>> {
    let row = sqlx::query(&format!("{} WHERE jwt_token = ?", SELECT_COLUMNS))
        .bind(token)
        .fetch_optional(pool)
        .await
        .context("Failed to get desktop session by token")?;

    Ok(row.as_ref().map(row_to_session_mysql))
}

async fn find_by_user_mysql(pool: &MySqlPool, user_id: &str) -> Result<Vec<DesktopSession>> {
    let rows = sqlx::query(&format!(
        "{} WHERE user_id = ? ORDER BY created_at DESC, id DESC",
        SELECT_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("Failed to list desktop sessions")?;

    Ok(rows.iter().map(row_to_session_mysql).collect())
}

async fn mark_used_mysql(pool: &MySqlPool, id: &str, used_at: DateTime<Utc>) -> Result<bool> {
    let result = sqlx::query("UPDATE desktop_sessions SET used_at = ? WHERE id = ?")
        .bind(used_at)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to mark desktop session as used")?;

    Ok(result.rows_affected() > 0)
}

async fn delete_mysql(pool: &MySqlPool, id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM desktop_sessions WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete desktop session")?;

    Ok(result.rows_affected() > 0)
}

async fn delete_expired_mysql(pool: &MySqlPool, before: DateTime<Utc>) -> Result<u64> {
    let result = sqlx::query("DELETE FROM desktop_sessions WHERE expires_at < ?")
        .bind(before)
        .execute(pool)
        .await
        .context("Failed to delete expired desktop sessions")?;

    Ok(result.rows_affected())
}

fn row_to_session_mysql(row: &sqlx::mysql::MySqlRow) -> DesktopSession {
    DesktopSession {
        id: row.get("id"),
        user_id: row.get("user_id"),
        app_id: row.get("app_id"),
        jwt_token: row.get("jwt_token"),
        created_at: row.get("created_at"),
        expires_at: row.get("expires_at"),
        used_at: row.get("used_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use crate::models::desktop_session_ttl;
    use chrono::{Duration, SubsecRound};

    async fn setup_test_repo() -> SqlxDesktopSessionRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxDesktopSessionRepository::new(pool)
    }

    fn new_session(user_id: &str, issued_at: DateTime<Utc>) -> NewDesktopSession {
        let issued_at = issued_at.trunc_subsecs(0);
        NewDesktopSession {
            user_id: user_id.to_string(),
            app_id: "default".to_string(),
            jwt_token: format!("token-{}", Uuid::new_v4()),
            issued_at,
            expires_at: issued_at + desktop_session_ttl(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_find_by_token() {
        let repo = setup_test_repo().await;

        let input = new_session("u1", Utc::now());
        let created = repo.insert(&input).await.expect("Failed to insert");

        assert_eq!(created.user_id, "u1");
        assert_eq!(created.created_at, input.issued_at);
        assert_eq!(created.expires_at - created.created_at, desktop_session_ttl());
        assert!(created.used_at.is_none());

        let found = repo
            .find_by_token(&input.jwt_token)
            .await
            .expect("Failed to query")
            .expect("Session not found");
        assert_eq!(found, created);
    }

    #[tokio::test]
    async fn test_find_by_token_not_found() {
        let repo = setup_test_repo().await;

        let found = repo.find_by_token("missing").await.expect("Failed to query");
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_insert_duplicate_token_fails() {
        let repo = setup_test_repo().await;

        let input = new_session("u1", Utc::now());
        repo.insert(&input).await.expect("Failed to insert");

        assert!(repo.insert(&input).await.is_err());
    }

    #[tokio::test]
    async fn test_find_by_user_orders_newest_first() {
        let repo = setup_test_repo().await;
        let now = Utc::now();

        let oldest = repo.insert(&new_session("u1", now - Duration::hours(3))).await.unwrap();
        let newest = repo.insert(&new_session("u1", now)).await.unwrap();
        let middle = repo.insert(&new_session("u1", now - Duration::hours(1))).await.unwrap();
        repo.insert(&new_session("u2", now)).await.unwrap();

        let sessions = repo.find_by_user("u1").await.expect("Failed to list");
        let ids: Vec<_> = sessions.iter().map(|s| s.id.as_str()).collect();

        assert_eq!(ids, vec![newest.id.as_str(), middle.id.as_str(), oldest.id.as_str()]);
    }

    #[tokio::test]
    async fn test_mark_used_last_write_wins() {
        let repo = setup_test_repo().await;
        let created = repo.insert(&new_session("u1", Utc::now())).await.unwrap();

        let first = created.created_at + Duration::seconds(5);
        let second = created.created_at + Duration::seconds(10);
        assert!(repo.mark_used(&created.id, first).await.unwrap());
        assert!(repo.mark_used(&created.id, second).await.unwrap());

        let found = repo.find_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(found.used_at, Some(second));
    }

    #[tokio::test]
    async fn test_mark_used_reports_missing_row() {
        let repo = setup_test_repo().await;
        let created = repo.insert(&new_session("u1", Utc::now())).await.unwrap();
        repo.delete(&created.id).await.unwrap();

        assert!(!repo.mark_used(&created.id, Utc::now()).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_reports_missing_row() {
        let repo = setup_test_repo().await;
        let created = repo.insert(&new_session("u1", Utc::now())).await.unwrap();

        assert!(repo.delete(&created.id).await.unwrap());
        assert!(repo.find_by_id(&created.id).await.unwrap().is_none());
        assert!(!repo.delete(&created.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_expired_only_removes_expired_rows() {
        let repo = setup_test_repo().await;
        let now = Utc::now();

        let expired = repo
            .insert(&new_session("u1", now - Duration::hours(30)))
            .await
            .unwrap();
        let valid = repo.insert(&new_session("u1", now)).await.unwrap();

        let deleted = repo.delete_expired(now).await.expect("Failed to clean up");

        assert_eq!(deleted, 1);
        assert!(repo.find_by_id(&expired.id).await.unwrap().is_none());
        assert!(repo.find_by_id(&valid.id).await.unwrap().is_some());
    }
}
