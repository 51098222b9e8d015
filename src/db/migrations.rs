//! Database migrations module
//!
//! Schema changes are embedded in the binary as SQL strings, one flavour per
//! supported backend, and recorded in the `_migrations` table once applied.
//!
//! # Usage
//!
//! ```ignore
//! use noticias::db::{create_pool, migrations};
//!
//! let pool = create_pool(&config).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};

use super::{Backend, DynDatabasePool};

/// A database migration with SQL for both SQLite and MySQL
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (must be unique and sequential)
    pub version: i32,
    /// Human-readable migration name
    pub name: &'static str,
    /// SQL statements for SQLite
    pub up_sqlite: &'static str,
    /// SQL statements for MySQL
    pub up_mysql: &'static str,
}

/// Migration record stored in the database
#[derive(Debug, Clone)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

/// All schema migrations, in application order.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_users",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(250) NOT NULL,
                password VARCHAR(50) NOT NULL,
                email VARCHAR(250) NOT NULL
            );
            CREATE INDEX IF NOT EXISTS ix_users_email ON users(email);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS users (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                name VARCHAR(250) NOT NULL,
                password VARCHAR(50) NOT NULL,
                email VARCHAR(250) NOT NULL
            );
            CREATE INDEX ix_users_email ON users(email);
        "#,
    },
    Migration {
        version: 2,
        name: "create_tags",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS tags (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                description VARCHAR(100) NOT NULL,
                CONSTRAINT uq_tags_description UNIQUE (description)
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS tags (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                description VARCHAR(100) NOT NULL,
                CONSTRAINT uq_tags_description UNIQUE (description)
            );
        "#,
    },
    Migration {
        version: 3,
        name: "create_news",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS news (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title VARCHAR(250) NOT NULL,
                body TEXT NOT NULL,
                author_id INTEGER NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                CONSTRAINT uq_news_title UNIQUE (title),
                CONSTRAINT fk_news_author FOREIGN KEY (author_id)
                    REFERENCES users(id) ON DELETE NO ACTION
            );
            CREATE INDEX IF NOT EXISTS ix_news_author_id ON news(author_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS news (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                title VARCHAR(250) NOT NULL,
                body TEXT NOT NULL,
                author_id BIGINT NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
                CONSTRAINT uq_news_title UNIQUE (title),
                CONSTRAINT fk_news_author FOREIGN KEY (author_id)
                    REFERENCES users(id) ON DELETE RESTRICT
            );
        "#,
    },
    // The tag side of the join started out cascading; version 5 restricts it.
    Migration {
        version: 4,
        name: "create_news_tags",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS news_tags (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                news_id INTEGER NOT NULL,
                tag_id INTEGER NOT NULL,
                CONSTRAINT uq_news_tags_pair UNIQUE (news_id, tag_id),
                CONSTRAINT fk_news_tags_news FOREIGN KEY (news_id)
                    REFERENCES news(id) ON DELETE CASCADE,
                CONSTRAINT fk_news_tags_tag FOREIGN KEY (tag_id)
                    REFERENCES tags(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS ix_news_tags_tag_id ON news_tags(tag_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS news_tags (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                news_id BIGINT NOT NULL,
                tag_id BIGINT NOT NULL,
                CONSTRAINT uq_news_tags_pair UNIQUE (news_id, tag_id),
                CONSTRAINT fk_news_tags_news FOREIGN KEY (news_id)
                    REFERENCES news(id) ON DELETE CASCADE,
                CONSTRAINT fk_news_tags_tag FOREIGN KEY (tag_id)
                    REFERENCES tags(id) ON DELETE CASCADE
            );
        "#,
    },
    // SQLite cannot alter a foreign key in place, so the table is rebuilt.
    // SQLite uses NO ACTION for blocked deletes: RESTRICT fails with the
    // trigger constraint code instead of the foreign key one.
    Migration {
        version: 5,
        name: "restrict_delete_tag_in_use",
        up_sqlite: r#"
            CREATE TABLE news_tags_rebuild (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                news_id INTEGER NOT NULL,
                tag_id INTEGER NOT NULL,
                CONSTRAINT uq_news_tags_pair UNIQUE (news_id, tag_id),
                CONSTRAINT fk_news_tags_news FOREIGN KEY (news_id)
                    REFERENCES news(id) ON DELETE CASCADE,
                CONSTRAINT fk_news_tags_tag FOREIGN KEY (tag_id)
                    REFERENCES tags(id) ON DELETE NO ACTION
            );
            INSERT INTO news_tags_rebuild (id, news_id, tag_id)
                SELECT id, news_id, tag_id FROM news_tags;
            DROP TABLE news_tags;
            ALTER TABLE news_tags_rebuild RENAME TO news_tags;
            CREATE INDEX IF NOT EXISTS ix_news_tags_tag_id ON news_tags(tag_id);
        "#,
        up_mysql: r#"
            ALTER TABLE news_tags DROP FOREIGN KEY fk_news_tags_tag;
            ALTER TABLE news_tags ADD CONSTRAINT fk_news_tags_tag FOREIGN KEY (tag_id)
                REFERENCES tags(id) ON DELETE RESTRICT;
        "#,
    },
];

/// Run all pending migrations.
///
/// Creates the tracking table when needed, then applies every migration not
/// yet recorded, in version order.
///
/// # Returns
///
/// Number of migrations applied
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;

    let applied = get_applied_migrations(pool).await?;
    let applied_versions: Vec<i32> = applied.iter().map(|m| m.version as i32).collect();

    let mut count = 0;

    for migration in MIGRATIONS {
        if !applied_versions.contains(&migration.version) {
            tracing::info!(
                "Applying migration {}: {}",
                migration.version,
                migration.name
            );
            apply_migration(pool, migration)
                .await
                .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }

    Ok(count)
}

async fn create_migrations_table(pool: &DynDatabasePool) -> Result<()> {
    match pool.backend() {
        Backend::Sqlite(sqlite) => {
            sqlx::query(
                r#"
                CREATE TABLE IF NOT EXISTS _migrations (
                    version INTEGER PRIMARY KEY,
                    name VARCHAR(255) NOT NULL UNIQUE,
                    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
                )
                "#,
            )
            .execute(sqlite)
            .await
            .context("Failed to create migrations table")?;
        }
        Backend::Mysql(mysql) => {
            sqlx::query(
                r#"
                CREATE TABLE IF NOT EXISTS _migrations (
                    version INT PRIMARY KEY,
                    name VARCHAR(255) NOT NULL UNIQUE,
                    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
                )
                "#,
            )
            .execute(mysql)
            .await
            .context("Failed to create migrations table")?;
        }
    }
    Ok(())
}

/// List the migrations already recorded in `_migrations`.
pub async fn applied_migrations(pool: &DynDatabasePool) -> Result<Vec<MigrationRecord>> {
    create_migrations_table(pool).await?;
    get_applied_migrations(pool).await
}

async fn get_applied_migrations(pool: &DynDatabasePool) -> Result<Vec<MigrationRecord>> {
    match pool.backend() {
        Backend::Sqlite(sqlite) => get_applied_migrations_sqlite(sqlite).await,
        Backend::Mysql(mysql) => get_applied_migrations_mysql(mysql).await,
    }
}

async fn get_applied_migrations_sqlite(pool: &SqlitePool) -> Result<Vec<MigrationRecord>> {
    let rows = sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
        .fetch_all(pool)
        .await
        .context("Failed to read applied migrations")?;

    Ok(rows
        .into_iter()
        .map(|row| MigrationRecord {
            version: row.get("version"),
            name: row.get("name"),
            applied_at: row.get("applied_at"),
        })
        .collect())
}

async fn get_applied_migrations_mysql(pool: &MySqlPool) -> Result<Vec<MigrationRecord>> {
    let rows = sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
        .fetch_all(pool)
        .await
        .context("Failed to read applied migrations")?;

    Ok(rows
        .into_iter()
        .map(|row| MigrationRecord {
            version: row.get::<i32, _>("version") as i64,
            name: row.get("name"),
            applied_at: row.get("applied_at"),
        })
        .collect())
}

async fn apply_migration(pool: &DynDatabasePool, migration: &Migration) -> Result<()> {
    match pool.backend() {
        Backend::Sqlite(sqlite) => apply_migration_sqlite(sqlite, migration).await,
        Backend::Mysql(mysql) => apply_migration_mysql(mysql, migration).await,
    }
}

async fn apply_migration_sqlite(pool: &SqlitePool, migration: &Migration) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to begin migration")?;

    for statement in split_sql_statements(migration.up_sqlite) {
        sqlx::query(statement)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }

    sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
        .bind(migration.version)
        .bind(migration.name)
        .execute(&mut *tx)
        .await
        .context("Failed to record migration")?;

    tx.commit().await.context("Failed to commit migration")?;
    Ok(())
}

// MySQL commits DDL implicitly, so statements run one by one on the pool.
async fn apply_migration_mysql(pool: &MySqlPool, migration: &Migration) -> Result<()> {
    for statement in split_sql_statements(migration.up_mysql) {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }

    sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
        .bind(migration.version)
        .bind(migration.name)
        .execute(pool)
        .await
        .context("Failed to record migration")?;

    Ok(())
}

/// Truncate SQL for error messages
fn truncate_sql(sql: &str) -> String {
    match sql.char_indices().nth(100) {
        Some((idx, _)) => format!("{}...", &sql[..idx]),
        None => sql.to_string(),
    }
}

/// Split SQL into individual statements, dropping comment-only fragments
fn split_sql_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty() && !is_comment_only(stmt))
        .collect()
}

/// Check if a string contains only SQL comments
fn is_comment_only(s: &str) -> bool {
    s.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"))
}

/// Check if migrations are up to date
pub async fn is_up_to_date(pool: &DynDatabasePool) -> Result<bool> {
    Ok(pending_count(pool).await? == 0)
}

/// Get pending migrations count
pub async fn pending_count(pool: &DynDatabasePool) -> Result<usize> {
    let applied = applied_migrations(pool).await?;
    Ok(MIGRATIONS.len().saturating_sub(applied.len()))
}
