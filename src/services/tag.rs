//! Tag service
//!
//! Business rules for tags:
//! - descriptions are unique; a unique violation raised by storage maps to
//!   the same error as the pre-check
//! - a tag linked to any news item can be neither edited nor deleted

use crate::db::is_foreign_key_violation;
use crate::db::is_unique_violation;
use crate::db::repositories::TagRepository;
use crate::models::Tag;
use anyhow::Context;
use std::sync::Arc;

/// Error types for tag service operations
#[derive(Debug, thiserror::Error)]
pub enum TagServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    DuplicateDescription(String),

    /// The tag is linked to news items
    #[error("{0}")]
    InUse(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

const DUPLICATE_DESCRIPTION: &str = "A tag with this description already exists.";
const NOT_FOUND: &str = "Tag not found.";
const IN_USE_EDIT: &str = "Cannot edit the tag because it is linked to one or more news items.";
const IN_USE_DELETE: &str = "Cannot delete the tag because it is linked to one or more news items.";

fn duplicate() -> TagServiceError {
    TagServiceError::DuplicateDescription(DUPLICATE_DESCRIPTION.to_string())
}

/// Tag service
pub struct TagService {
    repo: Arc<dyn TagRepository>,
}

impl TagService {
    pub fn new(repo: Arc<dyn TagRepository>) -> Self {
        Self { repo }
    }

    /// All tags ordered by description
    pub async fn list(&self) -> Result<Vec<Tag>, TagServiceError> {
        Ok(self.repo.list().await.context("Failed to list tags")?)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Tag>, TagServiceError> {
        Ok(self
            .repo
            .get_by_id(id)
            .await
            .with_context(|| format!("Failed to get tag {}", id))?)
    }

    /// Create a tag.
    ///
    /// # Errors
    /// - `DuplicateDescription` if the description is taken, whether the
    ///   pre-check or the insert notices it
    pub async fn create(&self, tag: Tag) -> Result<Tag, TagServiceError> {
        if self
            .repo
            .exists_with_description(&tag.description)
            .await
            .context("Failed to check tag description")?
        {
            return Err(duplicate());
        }

        match self.repo.create(&tag).await {
            Ok(created) => Ok(created),
            Err(e) if is_unique_violation(&e) => Err(duplicate()),
            Err(e) => Err(e.context("Failed to create tag").into()),
        }
    }

    /// Change the description of a tag that no news item uses.
    ///
    /// # Errors
    /// - `NotFound` if the id is unknown
    /// - `InUse` if any news item links the tag
    /// - `DuplicateDescription` if storage reports the description as taken
    pub async fn update(&self, tag: Tag) -> Result<Tag, TagServiceError> {
        let mut current = self
            .repo
            .get_by_id(tag.id)
            .await
            .with_context(|| format!("Failed to get tag {}", tag.id))?
            .ok_or_else(|| TagServiceError::NotFound(NOT_FOUND.to_string()))?;

        if self
            .repo
            .is_in_use(tag.id)
            .await
            .context("Failed to check tag usage")?
        {
            return Err(TagServiceError::InUse(IN_USE_EDIT.to_string()));
        }

        current.description = tag.description;

        match self.repo.update(&current).await {
            Ok(()) => Ok(current),
            Err(e) if is_unique_violation(&e) => Err(duplicate()),
            Err(e) => Err(e.context("Failed to update tag").into()),
        }
    }

    /// Delete a tag that no news item uses.
    ///
    /// # Errors
    /// - `NotFound` if the id is unknown
    /// - `InUse` if any news item links the tag
    pub async fn delete(&self, id: i64) -> Result<(), TagServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .with_context(|| format!("Failed to get tag {}", id))?
            .ok_or_else(|| TagServiceError::NotFound(NOT_FOUND.to_string()))?;

        if self
            .repo
            .is_in_use(id)
            .await
            .context("Failed to check tag usage")?
        {
            return Err(TagServiceError::InUse(IN_USE_DELETE.to_string()));
        }

        match self.repo.delete(id).await {
            Ok(()) => Ok(()),
            // Linked between the check and the delete
            Err(e) if is_foreign_key_violation(&e) => {
                Err(TagServiceError::InUse(IN_USE_DELETE.to_string()))
            }
            Err(e) => Err(e.context("Failed to delete tag").into()),
        }
    }
}
