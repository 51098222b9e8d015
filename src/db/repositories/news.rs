//! News repository
//!
//! Database operations for news items and their tag associations.
//!
//! Writes that touch both `news` and `news_tags` run inside a single
//! transaction, so a failed tag link leaves the news row untouched.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{News, NewsWithRelations, Tag, TagChanges, User};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{mysql::MySqlRow, sqlite::SqliteRow, MySqlPool, Row, SqlitePool};
use std::collections::HashMap;
use std::sync::Arc;

/// News repository trait
#[async_trait]
pub trait NewsRepository: Send + Sync {
    /// List all news, newest first, with author and tags
    async fn list_with_relations(&self) -> Result<Vec<NewsWithRelations>>;

    /// Get one news item with author and tags
    async fn get_with_relations(&self, id: i64) -> Result<Option<NewsWithRelations>>;

    /// Get news by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<News>>;

    /// Ids of the tags currently linked to a news item, ascending
    async fn get_tag_ids(&self, id: i64) -> Result<Vec<i64>>;

    /// Check whether a news item with this title exists
    async fn exists_with_title(&self, title: &str) -> Result<bool>;

    /// Check whether a news item other than `id` has this title
    async fn exists_other_with_title(&self, id: i64, title: &str) -> Result<bool>;

    /// Insert a news item and link it to `tag_ids` in one transaction
    async fn create_with_tags(&self, news: &News, tag_ids: &[i64]) -> Result<News>;

    /// Overwrite the fields of a news item and apply tag link changes in one
    /// transaction
    async fn update_with_tags(&self, news: &News, changes: &TagChanges) -> Result<()>;

    /// Delete a news item; its tag links go with it
    async fn delete(&self, id: i64) -> Result<()>;
}

/// SQLx-based news repository implementation
pub struct SqlxNewsRepository {
    pool: DynDatabasePool,
}

impl SqlxNewsRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn NewsRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl NewsRepository for SqlxNewsRepository {
    async fn list_with_relations(&self) -> Result<Vec<NewsWithRelations>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => list_news_sqlite(pool).await,
            Backend::Mysql(pool) => list_news_mysql(pool).await,
        }
    }

    async fn get_with_relations(&self, id: i64) -> Result<Option<NewsWithRelations>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_news_with_relations_sqlite(pool, id).await,
            Backend::Mysql(pool) => get_news_with_relations_mysql(pool, id).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<News>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_news_by_id_sqlite(pool, id).await,
            Backend::Mysql(pool) => get_news_by_id_mysql(pool, id).await,
        }
    }

    async fn get_tag_ids(&self, id: i64) -> Result<Vec<i64>> {
        let sql = "SELECT tag_id FROM news_tags WHERE news_id = ? ORDER BY tag_id";
        match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query_scalar::<_, i64>(sql)
                .bind(id)
                .fetch_all(pool)
                .await
                .context("Failed to get news tag ids"),
            Backend::Mysql(pool) => sqlx::query_scalar::<_, i64>(sql)
                .bind(id)
                .fetch_all(pool)
                .await
                .context("Failed to get news tag ids"),
        }
    }

    async fn exists_with_title(&self, title: &str) -> Result<bool> {
        let count = match self.pool.backend() {
            Backend::Sqlite(pool) => count_by_title_sqlite(pool, title, None).await?,
            Backend::Mysql(pool) => count_by_title_mysql(pool, title, None).await?,
        };
        Ok(count > 0)
    }

    async fn exists_other_with_title(&self, id: i64, title: &str) -> Result<bool> {
        let count = match self.pool.backend() {
            Backend::Sqlite(pool) => count_by_title_sqlite(pool, title, Some(id)).await?,
            Backend::Mysql(pool) => count_by_title_mysql(pool, title, Some(id)).await?,
        };
        Ok(count > 0)
    }

    async fn create_with_tags(&self, news: &News, tag_ids: &[i64]) -> Result<News> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => create_news_sqlite(pool, news, tag_ids).await,
            Backend::Mysql(pool) => create_news_mysql(pool, news, tag_ids).await,
        }
    }

    async fn update_with_tags(&self, news: &News, changes: &TagChanges) -> Result<()> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => update_news_sqlite(pool, news, changes).await,
            Backend::Mysql(pool) => update_news_mysql(pool, news, changes).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let sql = "DELETE FROM news WHERE id = ?";
        match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql).bind(id).execute(pool).await.map(|_| ()),
            Backend::Mysql(pool) => sqlx::query(sql).bind(id).execute(pool).await.map(|_| ()),
        }
        .with_context(|| format!("Failed to delete news {}", id))
    }
}

const SELECT_NEWS: &str = "SELECT id, title, body, author_id, created_at, updated_at FROM news";

const SELECT_NEWS_WITH_AUTHOR: &str = r#"
    SELECT n.id, n.title, n.body, n.author_id, n.created_at, n.updated_at,
           u.name AS author_name, u.password AS author_password, u.email AS author_email
    FROM news n
    INNER JOIN users u ON u.id = n.author_id
"#;

const SELECT_NEWS_TAGS: &str = r#"
    SELECT nt.news_id, t.id, t.description
    FROM news_tags nt
    INNER JOIN tags t ON t.id = nt.tag_id
"#;

/// Attach grouped tags to each news row, keeping the row order.
fn attach_tags(
    rows: Vec<(News, User)>,
    mut tags: HashMap<i64, Vec<Tag>>,
) -> Vec<NewsWithRelations> {
    rows.into_iter()
        .map(|(news, author)| {
            let tags = tags.remove(&news.id).unwrap_or_default();
            NewsWithRelations { news, author, tags }
        })
        .collect()
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn list_news_sqlite(pool: &SqlitePool) -> Result<Vec<NewsWithRelations>> {
    let rows = sqlx::query(&format!("{} ORDER BY n.id DESC", SELECT_NEWS_WITH_AUTHOR))
        .fetch_all(pool)
        .await
        .context("Failed to list news")?;
    let news = rows
        .iter()
        .map(row_to_news_with_author_sqlite)
        .collect::<Result<Vec<_>>>()?;

    let tag_rows = sqlx::query(&format!("{} ORDER BY t.description", SELECT_NEWS_TAGS))
        .fetch_all(pool)
        .await
        .context("Failed to list news tags")?;
    let mut tags: HashMap<i64, Vec<Tag>> = HashMap::new();
    for row in &tag_rows {
        let news_id: i64 = row.try_get("news_id")?;
        tags.entry(news_id).or_default().push(row_to_tag_sqlite(row)?);
    }

    Ok(attach_tags(news, tags))
}

async fn get_news_with_relations_sqlite(
    pool: &SqlitePool,
    id: i64,
) -> Result<Option<NewsWithRelations>> {
    let row = sqlx::query(&format!("{} WHERE n.id = ?", SELECT_NEWS_WITH_AUTHOR))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get news by ID")?;
    let Some(row) = row else {
        return Ok(None);
    };
    let (news, author) = row_to_news_with_author_sqlite(&row)?;

    let tag_rows = sqlx::query(&format!(
        "{} WHERE nt.news_id = ? ORDER BY t.description",
        SELECT_NEWS_TAGS
    ))
    .bind(id)
    .fetch_all(pool)
    .await
    .context("Failed to get news tags")?;
    let tags = tag_rows
        .iter()
        .map(row_to_tag_sqlite)
        .collect::<Result<Vec<_>>>()?;

    Ok(Some(NewsWithRelations { news, author, tags }))
}

async fn get_news_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<News>> {
    let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_NEWS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get news by ID")?;

    row.as_ref().map(row_to_news_sqlite).transpose()
}

async fn count_by_title_sqlite(pool: &SqlitePool, title: &str, except: Option<i64>) -> Result<i64> {
    let query = match except {
        Some(id) => sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM news WHERE title = ? AND id <> ?",
        )
        .bind(title)
        .bind(id),
        None => sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM news WHERE title = ?")
            .bind(title),
    };

    query
        .fetch_one(pool)
        .await
        .context("Failed to check news title")
}

async fn create_news_sqlite(pool: &SqlitePool, news: &News, tag_ids: &[i64]) -> Result<News> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let result = sqlx::query(
        r#"
        INSERT INTO news (title, body, author_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&news.title)
    .bind(&news.body)
    .bind(news.author_id)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to create news")?;
    let id = result.last_insert_rowid();

    for tag_id in tag_ids {
        sqlx::query("INSERT INTO news_tags (news_id, tag_id) VALUES (?, ?)")
            .bind(id)
            .bind(tag_id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to link tag {} to news", tag_id))?;
    }

    tx.commit().await.context("Failed to commit news")?;

    Ok(News {
        id,
        created_at: now,
        updated_at: now,
        ..news.clone()
    })
}

async fn update_news_sqlite(pool: &SqlitePool, news: &News, changes: &TagChanges) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    sqlx::query("UPDATE news SET title = ?, body = ?, author_id = ?, updated_at = ? WHERE id = ?")
        .bind(&news.title)
        .bind(&news.body)
        .bind(news.author_id)
        .bind(Utc::now())
        .bind(news.id)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to update news {}", news.id))?;

    for tag_id in &changes.removed {
        sqlx::query("DELETE FROM news_tags WHERE news_id = ? AND tag_id = ?")
            .bind(news.id)
            .bind(tag_id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to unlink tag {} from news {}", tag_id, news.id))?;
    }
    for tag_id in &changes.added {
        sqlx::query("INSERT INTO news_tags (news_id, tag_id) VALUES (?, ?)")
            .bind(news.id)
            .bind(tag_id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to link tag {} to news {}", tag_id, news.id))?;
    }

    tx.commit().await.context("Failed to commit news")?;
    Ok(())
}

fn row_to_news_sqlite(row: &SqliteRow) -> Result<News> {
    Ok(News {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        body: row.try_get("body")?,
        author_id: row.try_get("author_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_news_with_author_sqlite(row: &SqliteRow) -> Result<(News, User)> {
    let news = row_to_news_sqlite(row)?;
    let author = User {
        id: news.author_id,
        name: row.try_get("author_name")?,
        password: row.try_get("author_password")?,
        email: row.try_get("author_email")?,
    };
    Ok((news, author))
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

async fn list_news_mysql(pool: &MySqlPool) -> Result<Vec<NewsWithRelations>> {
    let rows = sqlx::query(&format!("{} ORDER BY n.id DESC", SELECT_NEWS_WITH_AUTHOR))
        .fetch_all(pool)
        .await
        .context("Failed to list news")?;
    let news = rows
        .iter()
        .map(row_to_news_with_author_mysql)
        .collect::<Result<Vec<_>>>()?;

    let tag_rows = sqlx::query(&format!("{} ORDER BY t.description", SELECT_NEWS_TAGS))
        .fetch_all(pool)
        .await
        .context("Failed to list news tags")?;
    let mut tags: HashMap<i64, Vec<Tag>> = HashMap::new();
    for row in &tag_rows {
        let news_id: i64 = row.try_get("news_id")?;
        tags.entry(news_id).or_default().push(row_to_tag_mysql(row)?);
    }

    Ok(attach_tags(news, tags))
}

async fn get_news_with_relations_mysql(
    pool: &MySqlPool,
    id: i64,
) -> Result<Option<NewsWithRelations>> {
    let row = sqlx::query(&format!("{} WHERE n.id = ?", SELECT_NEWS_WITH_AUTHOR))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get news by ID")?;
    let Some(row) = row else {
        return Ok(None);
    };
    let (news, author) = row_to_news_with_author_mysql(&row)?;

    let tag_rows = sqlx::query(&format!(
        "{} WHERE nt.news_id = ? ORDER BY t.description",
        SELECT_NEWS_TAGS
    ))
    .bind(id)
    .fetch_all(pool)
    .await
    .context("Failed to get news tags")?;
    let tags = tag_rows
        .iter()
        .map(row_to_tag_mysql)
        .collect::<Result<Vec<_>>>()?;

    Ok(Some(NewsWithRelations { news, author, tags }))
}

async fn get_news_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<News>> {
    let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_NEWS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get news by ID")?;

    row.as_ref().map(row_to_news_mysql).transpose()
}

async fn count_by_title_mysql(pool: &MySqlPool, title: &str, except: Option<i64>) -> Result<i64> {
    let query = match except {
        Some(id) => sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM news WHERE title = ? AND id <> ?",
        )
        .bind(title)
        .bind(id),
        None => sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM news WHERE title = ?")
            .bind(title),
    };

    query
        .fetch_one(pool)
        .await
        .context("Failed to check news title")
}

async fn create_news_mysql(pool: &MySqlPool, news: &News, tag_ids: &[i64]) -> Result<News> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let result = sqlx::query(
        r#"
        INSERT INTO news (title, body, author_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&news.title)
    .bind(&news.body)
    .bind(news.author_id)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to create news")?;
    let id = result.last_insert_id() as i64;

    for tag_id in tag_ids {
        sqlx::query("INSERT INTO news_tags (news_id, tag_id) VALUES (?, ?)")
            .bind(id)
            .bind(tag_id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to link tag {} to news", tag_id))?;
    }

    tx.commit().await.context("Failed to commit news")?;

    Ok(News {
        id,
        created_at: now,
        updated_at: now,
        ..news.clone()
    })
}

async fn update_news_mysql(pool: &MySqlPool, news: &News, changes: &TagChanges) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    sqlx::query("UPDATE news SET title = ?, body = ?, author_id = ?, updated_at = ? WHERE id = ?")
        .bind(&news.title)
        .bind(&news.body)
        .bind(news.author_id)
        .bind(Utc::now())
        .bind(news.id)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to update news {}", news.id))?;

    for tag_id in &changes.removed {
        sqlx::query("DELETE FROM news_tags WHERE news_id = ? AND tag_id = ?")
            .bind(news.id)
            .bind(tag_id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to unlink tag {} from news {}", tag_id, news.id))?;
    }
    for tag_id in &changes.added {
        sqlx::query("INSERT INTO news_tags (news_id, tag_id) VALUES (?, ?)")
            .bind(news.id)
            .bind(tag_id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to link tag {} to news {}", tag_id, news.id))?;
    }

    tx.commit().await.context("Failed to commit news")?;
    Ok(())
}

fn row_to_news_mysql(row: &MySqlRow) -> Result<News> {
    Ok(News {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        body: row.try_get("body")?,
        author_id: row.try_get("author_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_news_with_author_mysql(row: &MySqlRow) -> Result<(News, User)> {
    let news = row_to_news_mysql(row)?;
    let author = User {
        id: news.author_id,
        name: row.try_get("author_name")?,
        password: row.try_get("author_password")?,
        email: row.try_get("author_email")?,
    };
    Ok((news, author))
}

fn row_to_tag_mysql(row: &MySqlRow) -> Result<Tag> {
    Ok(Tag {
        id: row.try_get("id")?,
        description: row.try_get("description")?,
    })
}
