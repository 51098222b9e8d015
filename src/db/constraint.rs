//! Recognising constraint violations inside repository errors
//!
//! Repositories wrap sqlx errors in `anyhow` context, so the services look
//! for the database error anywhere in the chain.

use sqlx::error::{DatabaseError, ErrorKind};

/// SQLITE_CONSTRAINT_TRIGGER, raised by `ON DELETE RESTRICT` keys
const SQLITE_CONSTRAINT_TRIGGER: &str = "1811";

fn violation_kind(err: &anyhow::Error) -> Option<ErrorKind> {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<sqlx::Error>())
        .find_map(|e| e.as_database_error().map(classify))
}

fn classify(db: &(dyn DatabaseError + 'static)) -> ErrorKind {
    match db.kind() {
        ErrorKind::Other
            if db.code().as_deref() == Some(SQLITE_CONSTRAINT_TRIGGER)
                && db.message().contains("FOREIGN KEY constraint failed") =>
        {
            ErrorKind::ForeignKeyViolation
        }
        kind => kind,
    }
}

/// True when the error was caused by a unique index or constraint.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    matches!(violation_kind(err), Some(ErrorKind::UniqueViolation))
}

/// True when the error was caused by a foreign key (restrict-delete or a
/// dangling reference).
pub fn is_foreign_key_violation(err: &anyhow::Error) -> bool {
    matches!(violation_kind(err), Some(ErrorKind::ForeignKeyViolation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations, sqlite_pool};
    use anyhow::Context;

    #[tokio::test]
    async fn test_detects_unique_violation_through_context() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let sqlite = sqlite_pool(&pool);

        let insert = "INSERT INTO tags (description) VALUES ('Politics')";
        sqlx::query(insert).execute(sqlite).await.unwrap();
        let err = sqlx::query(insert)
            .execute(sqlite)
            .await
            .context("Failed to create tag")
            .context("outer")
            .unwrap_err();

        assert!(is_unique_violation(&err));
        assert!(!is_foreign_key_violation(&err));
    }

    #[tokio::test]
    async fn test_detects_foreign_key_violation() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let err = sqlx::query("INSERT INTO news (title, body, author_id) VALUES ('t', 'b', 7)")
            .execute(sqlite_pool(&pool))
            .await
            .context("Failed to create news")
            .unwrap_err();

        assert!(is_foreign_key_violation(&err));
        assert!(!is_unique_violation(&err));
    }

    #[tokio::test]
    async fn test_detects_blocked_delete_of_referenced_row() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let sqlite = sqlite_pool(&pool);

        sqlx::query("INSERT INTO users (name, password, email) VALUES ('Ana', 'x', 'ana@example.com')")
            .execute(sqlite)
            .await
            .unwrap();
        sqlx::query("INSERT INTO news (title, body, author_id) VALUES ('t', 'b', 1)")
            .execute(sqlite)
            .await
            .unwrap();

        let err = sqlx::query("DELETE FROM users WHERE id = 1")
            .execute(sqlite)
            .await
            .context("Failed to delete user")
            .unwrap_err();

        assert!(is_foreign_key_violation(&err));
    }

    #[tokio::test]
    async fn test_restrict_trigger_code_counts_as_foreign_key() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        let sqlite = sqlite_pool(&pool);

        for sql in [
            "CREATE TABLE parent (id INTEGER PRIMARY KEY)",
            "CREATE TABLE child (parent_id INTEGER NOT NULL REFERENCES parent(id) ON DELETE RESTRICT)",
            "INSERT INTO parent (id) VALUES (1)",
            "INSERT INTO child (parent_id) VALUES (1)",
        ] {
            sqlx::query(sql).execute(sqlite).await.unwrap();
        }

        let err = sqlx::query("DELETE FROM parent WHERE id = 1")
            .execute(sqlite)
            .await
            .context("Failed to delete parent")
            .unwrap_err();

        assert!(is_foreign_key_violation(&err));
        assert!(!is_unique_violation(&err));
    }

    #[test]
    fn test_plain_errors_are_not_violations() {
        let err = anyhow::anyhow!("connection reset");
        assert!(!is_unique_violation(&err));
        assert!(!is_foreign_key_violation(&err));
    }
}
