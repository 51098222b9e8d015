//! Services layer - Business logic
//!
//! Services sit between the HTTP handlers and the repositories. They:
//! - enforce uniqueness and usage rules
//! - map storage constraint failures to domain errors
//! - decide which tag links to add or remove on news updates

pub mod news;
pub mod tag;
pub mod user;

pub use news::{reconcile_tags, NewsService, NewsServiceError};
pub use tag::{TagService, TagServiceError};
pub use user::{UserService, UserServiceError};
