//! Tag model

use serde::{Deserialize, Serialize};

use super::validation::ValidationErrors;

pub const DESCRIPTION_MAX_CHARS: usize = 100;

/// Tag entity. Descriptions are unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub description: String,
}

impl Tag {
    /// Create a new Tag; the ID is assigned by the database.
    pub fn new(description: String) -> Self {
        Self { id: 0, description }
    }
}

/// Form input for creating or editing a tag
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TagInput {
    /// Hidden id carried by edit forms; zero on create
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub description: String,
}

impl TagInput {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if errors.require("description", "Description", &self.description) {
            errors.max_chars(
                "description",
                "Description",
                &self.description,
                DESCRIPTION_MAX_CHARS,
            );
        }
        errors.into_result()
    }

    pub fn into_tag(self, id: i64) -> Tag {
        Tag {
            id,
            description: self.description.trim().to_string(),
        }
    }
}

impl From<&Tag> for TagInput {
    fn from(tag: &Tag) -> Self {
        Self {
            id: tag.id,
            description: tag.description.clone(),
        }
    }
}
