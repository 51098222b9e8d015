//! News model
//!
//! A news item belongs to one author and carries any number of tags through
//! the `news_tags` join table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::validation::ValidationErrors;
use super::{Tag, User};

pub const TITLE_MAX_CHARS: usize = 250;

/// News entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct News {
    pub id: i64,
    /// Unique across all news
    pub title: String,
    pub body: String,
    pub author_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl News {
    /// Create a new News item; the ID is assigned by the database.
    pub fn new(title: String, body: String, author_id: i64) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            title,
            body,
            author_id,
            created_at: now,
            updated_at: now,
        }
    }
}

/// News item with its author and tags, for list and details views
#[derive(Debug, Clone, Serialize)]
pub struct NewsWithRelations {
    #[serde(flatten)]
    pub news: News,
    pub author: User,
    pub tags: Vec<Tag>,
}

/// News item with the ids of its current tags, for the edit form
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewsForEdit {
    pub news: News,
    pub tag_ids: Vec<i64>,
}

/// Join rows to insert and delete when a news item's tag set changes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagChanges {
    /// Tag ids to link, ascending
    pub added: Vec<i64>,
    /// Tag ids to unlink, ascending
    pub removed: Vec<i64>,
}

impl TagChanges {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// JSON body posted by the background news form.
///
/// Field names follow the wire contract of the client script.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NewsInput {
    #[serde(default)]
    pub id: i64,
    #[serde(default, rename = "titulo")]
    pub title: String,
    #[serde(default, rename = "texto")]
    pub body: String,
    #[serde(default, rename = "usuarioId")]
    pub author_id: i64,
    #[serde(default, rename = "selectedTagIds")]
    pub tag_ids: Vec<i64>,
}

impl NewsInput {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if errors.require("title", "Title", &self.title) {
            errors.max_chars("title", "Title", &self.title, TITLE_MAX_CHARS);
        }
        errors.require("body", "Text", &self.body);
        if self.author_id <= 0 {
            errors.add("author_id", "Author is required.");
        }
        if self.tag_ids.is_empty() {
            errors.add("tag_ids", "Select at least one tag.");
        }

        errors.into_result()
    }

    /// Requested tag ids without duplicates, in ascending order.
    pub fn distinct_tag_ids(&self) -> Vec<i64> {
        self.tag_ids
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Build the entity for the given id.
    pub fn to_news(&self, id: i64) -> News {
        News {
            id,
            title: self.title.trim().to_string(),
            body: self.body.clone(),
            ..News::new(String::new(), String::new(), self.author_id)
        }
    }
}
