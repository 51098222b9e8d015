//! Tag repository
//!
//! Database operations for tags.
//!
//! This module provides:
//! - `TagRepository` trait defining the interface for tag data access
//! - `SqlxTagRepository` implementing the trait for SQLite and MySQL

use crate::db::{Backend, DynDatabasePool};
use crate::models::Tag;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{mysql::MySqlRow, sqlite::SqliteRow, MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Tag repository trait
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// List all tags ordered by description
    async fn list(&self) -> Result<Vec<Tag>>;

    /// Get tag by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Tag>>;

    /// Check whether a tag with this description exists
    async fn exists_with_description(&self, description: &str) -> Result<bool>;

    /// Check whether any news item references the tag
    async fn is_in_use(&self, id: i64) -> Result<bool>;

    /// Insert a tag and return it with its new ID
    async fn create(&self, tag: &Tag) -> Result<Tag>;

    /// Overwrite the description
    async fn update(&self, tag: &Tag) -> Result<()>;

    /// Delete a tag
    async fn delete(&self, id: i64) -> Result<()>;
}

/// SQLx-based tag repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxTagRepository {
    pool: DynDatabasePool,
}

impl SqlxTagRepository {
    /// Create a new SQLx tag repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TagRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl TagRepository for SqlxTagRepository {
    async fn list(&self) -> Result<Vec<Tag>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => list_tags_sqlite(pool).await,
            Backend::Mysql(pool) => list_tags_mysql(pool).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Tag>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_tag_by_id_sqlite(pool, id).await,
            Backend::Mysql(pool) => get_tag_by_id_mysql(pool, id).await,
        }
    }

    async fn exists_with_description(&self, description: &str) -> Result<bool> {
        let count = match self.pool.backend() {
            Backend::Sqlite(pool) => count_by_description_sqlite(pool, description).await?,
            Backend::Mysql(pool) => count_by_description_mysql(pool, description).await?,
        };
        Ok(count > 0)
    }

    async fn is_in_use(&self, id: i64) -> Result<bool> {
        let count = match self.pool.backend() {
            Backend::Sqlite(pool) => count_usages_sqlite(pool, id).await?,
            Backend::Mysql(pool) => count_usages_mysql(pool, id).await?,
        };
        Ok(count > 0)
    }

    async fn create(&self, tag: &Tag) -> Result<Tag> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => create_tag_sqlite(pool, tag).await,
            Backend::Mysql(pool) => create_tag_mysql(pool, tag).await,
        }
    }

    async fn update(&self, tag: &Tag) -> Result<()> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => update_tag_sqlite(pool, tag).await,
            Backend::Mysql(pool) => update_tag_mysql(pool, tag).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<()> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => delete_tag_sqlite(pool, id).await,
            Backend::Mysql(pool) => delete_tag_mysql(pool, id).await,
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn list_tags_sqlite(pool: &SqlitePool) -> Result<Vec<Tag>> {
    let rows = sqlx::query("SELECT id, description FROM tags ORDER BY description")
        .fetch_all(pool)
        .await
        .context("Failed to list tags")?;

    rows.iter().map(row_to_tag_sqlite).collect()
}

async fn get_tag_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Tag>> {
    let row = sqlx::query("SELECT id, description FROM tags WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get tag by ID")?;

    match row {
        Some(row) => Ok(Some(row_to_tag_sqlite(&row)?)),
        None => Ok(None),
    }
}

async fn count_by_description_sqlite(pool: &SqlitePool, description: &str) -> Result<i64> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tags WHERE description = ?")
        .bind(description)
        .fetch_one(pool)
        .await
        .context("Failed to check tag description")
}

async fn count_usages_sqlite(pool: &SqlitePool, id: i64) -> Result<i64> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM news_tags WHERE tag_id = ?")
        .bind(id)
        .fetch_one(pool)
        .await
        .context("Failed to check tag usage")
}

async fn create_tag_sqlite(pool: &SqlitePool, tag: &Tag) -> Result<Tag> {
    let result = sqlx::query("INSERT INTO tags (description) VALUES (?)")
        .bind(&tag.description)
        .execute(pool)
        .await
        .context("Failed to create tag")?;

    Ok(Tag {
        id: result.last_insert_rowid(),
        description: tag.description.clone(),
    })
}

async fn update_tag_sqlite(pool: &SqlitePool, tag: &Tag) -> Result<()> {
    sqlx::query("UPDATE tags SET description = ? WHERE id = ?")
        .bind(&tag.description)
        .bind(tag.id)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to update tag {}", tag.id))?;

    Ok(())
}

async fn delete_tag_sqlite(pool: &SqlitePool, id: i64) -> Result<()> {
    // Rejected by fk_news_tags_tag while any news item still uses the tag
    sqlx::query("DELETE FROM tags WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to delete tag {}", id))?;

    Ok(())
}

fn row_to_tag_sqlite(row: &SqliteRow) -> Result<Tag> {
    Ok(Tag {
        id: row.try_get("id")?,
        description: row.try_get("description")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn list_tags_mysql(pool: &MySqlPool) -> Result<Vec<Tag>> {
    let rows = sqlx::query("SELECT id, description FROM tags ORDER BY description")
        .fetch_all(pool)
        .await
        .context("Failed to list tags")?;

    rows.iter().map(row_to_tag_mysql).collect()
}

async fn get_tag_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Tag>> {
    let row = sqlx::query("SELECT id, description FROM tags WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get tag by ID")?;

    match row {
        Some(row) => Ok(Some(row_to_tag_mysql(&row)?)),
        None => Ok(None),
    }
}

async fn count_by_description_mysql(pool: &MySqlPool, description: &str) -> Result<i64> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tags WHERE description = ?")
        .bind(description)
        .fetch_one(pool)
        .await
        .context("Failed to check tag description")
}

async fn count_usages_mysql(pool: &MySqlPool, id: i64) -> Result<i64> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM news_tags WHERE tag_id = ?")
        .bind(id)
        .fetch_one(pool)
        .await
        .context("Failed to check tag usage")
}

async fn create_tag_mysql(pool: &MySqlPool, tag: &Tag) -> Result<Tag> {
    let result = sqlx::query("INSERT INTO tags (description) VALUES (?)")
        .bind(&tag.description)
        .execute(pool)
        .await
        .context("Failed to create tag")?;

    Ok(Tag {
        id: result.last_insert_id() as i64,
        description: tag.description.clone(),
    })
}

async fn update_tag_mysql(pool: &MySqlPool, tag: &Tag) -> Result<()> {
    sqlx::query("UPDATE tags SET description = ? WHERE id = ?")
        .bind(&tag.description)
        .bind(tag.id)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to update tag {}", tag.id))?;

    Ok(())
}

async fn delete_tag_mysql(pool: &MySqlPool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM tags WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to delete tag {}", id))?;

    Ok(())
}

fn row_to_tag_mysql(row: &MySqlRow) -> Result<Tag> {
    Ok(Tag {
        id: row.try_get("id")?,
        description: row.try_get("description")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, is_unique_violation, migrations, sqlite_pool};

    async fn setup_test_repo() -> (SqlxTagRepository, DynDatabasePool) {
        let pool = create_test_pool()
            .await
            .expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        (SqlxTagRepository::new(pool.clone()), pool)
    }

    #[tokio::test]
    async fn test_create_and_get_tag() {
        let (repo, _) = setup_test_repo().await;

        let tag = repo
            .create(&Tag::new("Politics".to_string()))
            .await
            .expect("Failed to create tag");
        assert!(tag.id > 0);

        let found = repo.get_by_id(tag.id).await.unwrap();
        assert_eq!(found, Some(tag));
        assert!(repo.get_by_id(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_description_is_unique_violation() {
        let (repo, _) = setup_test_repo().await;
        repo.create(&Tag::new("Politics".to_string())).await.unwrap();

        let err = repo
            .create(&Tag::new("Politics".to_string()))
            .await
            .expect_err("duplicate must fail");
        assert!(is_unique_violation(&err));
        assert!(repo.exists_with_description("Politics").await.unwrap());
        assert!(!repo.exists_with_description("Sports").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_orders_by_description() {
        let (repo, _) = setup_test_repo().await;
        for d in ["Sports", "Economy", "Politics"] {
            repo.create(&Tag::new(d.to_string())).await.unwrap();
        }

        let descriptions: Vec<String> = repo
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.description)
            .collect();
        assert_eq!(descriptions, vec!["Economy", "Politics", "Sports"]);
    }

    #[tokio::test]
    async fn test_is_in_use() {
        let (repo, pool) = setup_test_repo().await;
        let tag = repo.create(&Tag::new("Politics".to_string())).await.unwrap();
        assert!(!repo.is_in_use(tag.id).await.unwrap());

        let sqlite = sqlite_pool(&pool);
        sqlx::query("INSERT INTO users (name, password, email) VALUES ('Ana', 'x', 'a@b.c')")
            .execute(sqlite)
            .await
            .unwrap();
        sqlx::query("INSERT INTO news (title, body, author_id) VALUES ('T', 'B', 1)")
            .execute(sqlite)
            .await
            .unwrap();
        sqlx::query("INSERT INTO news_tags (news_id, tag_id) VALUES (1, ?)")
            .bind(tag.id)
            .execute(sqlite)
            .await
            .unwrap();

        assert!(repo.is_in_use(tag.id).await.unwrap());
        assert!(repo.delete(tag.id).await.is_err());
    }

    #[tokio::test]
    async fn test_update_and_delete_tag() {
        let (repo, _) = setup_test_repo().await;
        let mut tag = repo.create(&Tag::new("Politcs".to_string())).await.unwrap();

        tag.description = "Politics".to_string();
        repo.update(&tag).await.expect("Failed to update tag");
        assert_eq!(
            repo.get_by_id(tag.id).await.unwrap().unwrap().description,
            "Politics"
        );

        repo.delete(tag.id).await.expect("Failed to delete tag");
        assert!(repo.get_by_id(tag.id).await.unwrap().is_none());
    }
}
