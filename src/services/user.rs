//! User service
//!
//! Business rules for users:
//! - e-mail addresses are unique among users (checked here, not in storage)
//! - updates and deletes of unknown ids are refused

use crate::db::repositories::UserRepository;
use crate::models::User;
use anyhow::Context;
use std::sync::Arc;

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    DuplicateEmail(String),

    /// Storage failure
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

const DUPLICATE_EMAIL: &str = "A user with this e-mail already exists.";
const NOT_FOUND: &str = "User not found.";

/// User service
pub struct UserService {
    repo: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(repo: Arc<dyn UserRepository>) -> Self {
        Self { repo }
    }

    /// All users ordered by name
    pub async fn list(&self) -> Result<Vec<User>, UserServiceError> {
        Ok(self.repo.list().await.context("Failed to list users")?)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self
            .repo
            .get_by_id(id)
            .await
            .with_context(|| format!("Failed to get user {}", id))?)
    }

    /// Create a user.
    ///
    /// # Errors
    /// - `DuplicateEmail` if any user already has the e-mail
    pub async fn create(&self, user: User) -> Result<User, UserServiceError> {
        if self
            .repo
            .exists_with_email(&user.email)
            .await
            .context("Failed to check user e-mail")?
        {
            return Err(UserServiceError::DuplicateEmail(DUPLICATE_EMAIL.to_string()));
        }

        let created = self
            .repo
            .create(&user)
            .await
            .context("Failed to create user")?;

        Ok(created)
    }

    /// Overwrite name, e-mail and password of an existing user.
    ///
    /// # Errors
    /// - `NotFound` if the id is unknown
    /// - `DuplicateEmail` if another user has the e-mail
    pub async fn update(&self, user: User) -> Result<User, UserServiceError> {
        let mut current = self
            .repo
            .get_by_id(user.id)
            .await
            .with_context(|| format!("Failed to get user {}", user.id))?
            .ok_or_else(|| UserServiceError::NotFound(NOT_FOUND.to_string()))?;

        if self
            .repo
            .exists_other_with_email(user.id, &user.email)
            .await
            .context("Failed to check user e-mail")?
        {
            return Err(UserServiceError::DuplicateEmail(DUPLICATE_EMAIL.to_string()));
        }

        current.name = user.name;
        current.email = user.email;
        current.password = user.password;

        self.repo
            .update(&current)
            .await
            .with_context(|| format!("Failed to update user {}", current.id))?;

        Ok(current)
    }

    /// Delete a user.
    ///
    /// A user who still authors news is rejected by storage; that surfaces
    /// as `InternalError`.
    pub async fn delete(&self, id: i64) -> Result<(), UserServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .with_context(|| format!("Failed to get user {}", id))?
            .ok_or_else(|| UserServiceError::NotFound(NOT_FOUND.to_string()))?;

        self.repo
            .delete(id)
            .await
            .with_context(|| format!("Failed to delete user {}", id))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxUserRepository;
    use crate::db::{create_test_pool, migrations, sqlite_pool, DynDatabasePool};

    async fn setup_test_service() -> (DynDatabasePool, UserService) {
        let pool = create_test_pool()
            .await
            .expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let repo = SqlxUserRepository::boxed(pool.clone());
        (pool, UserService::new(repo))
    }

    fn user(name: &str, email: &str) -> User {
        User::new(name.to_string(), "secret".to_string(), email.to_string())
    }

    #[tokio::test]
    async fn test_create_user() {
        let (_pool, service) = setup_test_service().await;

        let created = service
            .create(user("Ana", "ana@example.com"))
            .await
            .expect("Failed to create user");

        assert!(created.id > 0);
        let found = service.get_by_id(created.id).await.unwrap();
        assert_eq!(found, Some(created));
    }

    #[tokio::test]
    async fn test_create_duplicate_email_fails() {
        let (_pool, service) = setup_test_service().await;
        service.create(user("Ana", "ana@example.com")).await.unwrap();

        let result = service.create(user("Other", "ana@example.com")).await;

        assert!(matches!(result, Err(UserServiceError::DuplicateEmail(_))));
        assert_eq!(service.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_user() {
        let (_pool, service) = setup_test_service().await;
        let created = service.create(user("Ana", "ana@example.com")).await.unwrap();

        let updated = service
            .update(User {
                id: created.id,
                name: "Ana Maria".into(),
                password: "new".into(),
                email: "ana@example.com".into(),
            })
            .await
            .expect("keeping one's own e-mail must be allowed");

        assert_eq!(updated.name, "Ana Maria");
        assert_eq!(updated.password, "new");
    }

    #[tokio::test]
    async fn test_update_missing_user_fails() {
        let (_pool, service) = setup_test_service().await;

        let mut ghost = user("Ghost", "ghost@example.com");
        ghost.id = 42;
        let result = service.update(ghost).await;

        assert!(matches!(result, Err(UserServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_to_taken_email_fails() {
        let (_pool, service) = setup_test_service().await;
        service.create(user("Ana", "ana@example.com")).await.unwrap();
        let mut bruno = service.create(user("Bruno", "bruno@example.com")).await.unwrap();

        bruno.email = "ana@example.com".into();
        let result = service.update(bruno).await;

        assert!(matches!(result, Err(UserServiceError::DuplicateEmail(_))));
    }

    #[tokio::test]
    async fn test_delete_user() {
        let (_pool, service) = setup_test_service().await;
        let created = service.create(user("Ana", "ana@example.com")).await.unwrap();

        service.delete(created.id).await.expect("Failed to delete user");

        assert!(service.get_by_id(created.id).await.unwrap().is_none());
        assert!(matches!(
            service.delete(created.id).await,
            Err(UserServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_author_of_news_fails() {
        let (pool, service) = setup_test_service().await;
        let created = service.create(user("Ana", "ana@example.com")).await.unwrap();
        sqlx::query("INSERT INTO news (title, body, author_id) VALUES ('T', 'B', ?)")
            .bind(created.id)
            .execute(sqlite_pool(&pool))
            .await
            .unwrap();

        let result = service.delete(created.id).await;

        assert!(matches!(result, Err(UserServiceError::InternalError(_))));
        assert!(service.get_by_id(created.id).await.unwrap().is_some());
    }
}
