//! Data models
//!
//! Database entities (User, Tag, News), the inputs bound from forms and JSON
//! bodies, and their field validation.

mod news;
mod tag;
mod user;
pub mod validation;

pub use news::{News, NewsForEdit, NewsInput, NewsWithRelations, TagChanges};
pub use tag::{Tag, TagInput};
pub use user::{User, UserInput};
pub use validation::{FieldError, ValidationErrors};
