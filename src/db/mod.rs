//! Database layer
//!
//! Persistence for issued desktop credentials. Supports:
//! - SQLite (default, for single-binary deployment)
//! - MySQL (for shared deployments)
//!
//! The driver is selected from configuration; repositories dispatch on
//! `DatabasePool::driver()` and run the matching SQL.
//!
//! # Usage
//!
//! ```ignore
//! use deskpair::config::DatabaseConfig;
//! use deskpair::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
