//! User repository
//!
//! Database operations for users.
//!
//! This module provides:
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait for SQLite and MySQL

use crate::db::{Backend, DynDatabasePool};
use crate::models::User;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{mysql::MySqlRow, sqlite::SqliteRow, MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// List all users ordered by name
    async fn list(&self) -> Result<Vec<User>>;

    /// Get user by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Check whether any user has this e-mail
    async fn exists_with_email(&self, email: &str) -> Result<bool>;

    /// Check whether a user other than `id` has this e-mail
    async fn exists_other_with_email(&self, id: i64, email: &str) -> Result<bool>;

    /// Insert a user and return it with its new ID
    async fn create(&self, user: &User) -> Result<User>;

    /// Overwrite name, password and e-mail
    async fn update(&self, user: &User) -> Result<()>;

    /// Delete a user
    async fn delete(&self, id: i64) -> Result<()>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn list(&self) -> Result<Vec<User>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => list_users_sqlite(pool).await,
            Backend::Mysql(pool) => list_users_mysql(pool).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_user_by_id_sqlite(pool, id).await,
            Backend::Mysql(pool) => get_user_by_id_mysql(pool, id).await,
        }
    }

    async fn exists_with_email(&self, email: &str) -> Result<bool> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => count_by_email_sqlite(pool, email, None).await.map(|n| n > 0),
            Backend::Mysql(pool) => count_by_email_mysql(pool, email, None).await.map(|n| n > 0),
        }
    }

    async fn exists_other_with_email(&self, id: i64, email: &str) -> Result<bool> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                count_by_email_sqlite(pool, email, Some(id)).await.map(|n| n > 0)
            }
            Backend::Mysql(pool) => {
                count_by_email_mysql(pool, email, Some(id)).await.map(|n| n > 0)
            }
        }
    }

    async fn create(&self, user: &User) -> Result<User> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => create_user_sqlite(pool, user).await,
            Backend::Mysql(pool) => create_user_mysql(pool, user).await,
        }
    }

    async fn update(&self, user: &User) -> Result<()> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => update_user_sqlite(pool, user).await,
            Backend::Mysql(pool) => update_user_mysql(pool, user).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<()> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => delete_user_sqlite(pool, id).await,
            Backend::Mysql(pool) => delete_user_mysql(pool, id).await,
        }
    }
}

const SELECT_USER: &str = "SELECT id, name, password, email FROM users";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn list_users_sqlite(pool: &SqlitePool) -> Result<Vec<User>> {
    let rows = sqlx::query(&format!("{} ORDER BY name, id", SELECT_USER))
        .fetch_all(pool)
        .await
        .context("Failed to list users")?;

    rows.iter().map(row_to_user_sqlite).collect()
}

async fn get_user_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
    let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_USER))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by ID")?;

    row.as_ref().map(row_to_user_sqlite).transpose()
}

async fn count_by_email_sqlite(pool: &SqlitePool, email: &str, except: Option<i64>) -> Result<i64> {
    let count: i64 = match except {
        Some(id) => sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE email = ? AND id <> ?")
            .bind(email)
            .bind(id)
            .fetch_one(pool)
            .await,
        None => sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(pool)
            .await,
    }
    .context("Failed to check user e-mail")?;

    Ok(count)
}

async fn create_user_sqlite(pool: &SqlitePool, user: &User) -> Result<User> {
    let result = sqlx::query("INSERT INTO users (name, password, email) VALUES (?, ?, ?)")
        .bind(&user.name)
        .bind(&user.password)
        .bind(&user.email)
        .execute(pool)
        .await
        .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_rowid(),
        ..user.clone()
    })
}

async fn update_user_sqlite(pool: &SqlitePool, user: &User) -> Result<()> {
    sqlx::query("UPDATE users SET name = ?, password = ?, email = ? WHERE id = ?")
        .bind(&user.name)
        .bind(&user.password)
        .bind(&user.email)
        .bind(user.id)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to update user {}", user.id))?;

    Ok(())
}

async fn delete_user_sqlite(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to delete user {}", id))?;

    Ok(())
}

fn row_to_user_sqlite(row: &SqliteRow) -> Result<User> {
    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        password: row.try_get("password")?,
        email: row.try_get("email")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn list_users_mysql(pool: &MySqlPool) -> Result<Vec<User>> {
    let rows = sqlx::query(&format!("{} ORDER BY name, id", SELECT_USER))
        .fetch_all(pool)
        .await
        .context("Failed to list users")?;

    rows.iter().map(row_to_user_mysql).collect()
}

async fn get_user_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<User>> {
    let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_USER))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by ID")?;

    row.as_ref().map(row_to_user_mysql).transpose()
}

async fn count_by_email_mysql(pool: &MySqlPool, email: &str, except: Option<i64>) -> Result<i64> {
    let count: i64 = match except {
        Some(id) => sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE email = ? AND id <> ?")
            .bind(email)
            .bind(id)
            .fetch_one(pool)
            .await,
        None => sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(pool)
            .await,
    }
    .context("Failed to check user e-mail")?;

    Ok(count)
}

async fn create_user_mysql(pool: &MySqlPool, user: &User) -> Result<User> {
    let result = sqlx::query("INSERT INTO users (name, password, email) VALUES (?, ?, ?)")
        .bind(&user.name)
        .bind(&user.password)
        .bind(&user.email)
        .execute(pool)
        .await
        .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_id() as i64,
        ..user.clone()
    })
}

async fn update_user_mysql(pool: &MySqlPool, user: &User) -> Result<()> {
    sqlx::query("UPDATE users SET name = ?, password = ?, email = ? WHERE id = ?")
        .bind(&user.name)
        .bind(&user.password)
        .bind(&user.email)
        .bind(user.id)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to update user {}", user.id))?;

    Ok(())
}

async fn delete_user_mysql(pool: &MySqlPool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to delete user {}", id))?;

    Ok(())
}

fn row_to_user_mysql(row: &MySqlRow) -> Result<User> {
    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        password: row.try_get("password")?,
        email: row.try_get("email")?,
    })
}
