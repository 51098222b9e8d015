//! Database repositories
//!
//! One repository per entity, each a trait plus its sqlx implementation.

pub mod news;
pub mod tag;
pub mod user;

pub use news::{NewsRepository, SqlxNewsRepository};
pub use tag::{SqlxTagRepository, TagRepository};
pub use user::{SqlxUserRepository, UserRepository};
