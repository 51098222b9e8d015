//! Database layer
//!
//! Persistence for users, tags and news on either backend:
//! - SQLite (default, single-file deployment)
//! - MySQL
//!
//! The driver is chosen from configuration and hidden behind the
//! `DatabasePool` trait; repositories borrow the concrete pool through
//! [`DatabasePool::backend`].
//!
//! # Usage
//!
//! ```ignore
//! use noticias::config::DatabaseConfig;
//! use noticias::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod constraint;
pub mod migrations;
pub mod pool;
pub mod repositories;

pub use constraint::{is_foreign_key_violation, is_unique_violation};
pub use pool::{
    create_pool, create_test_pool, Backend, DatabasePool, DynDatabasePool, MysqlDatabase,
    SqliteDatabase,
};

#[cfg(test)]
pub(crate) use pool::sqlite_pool;
