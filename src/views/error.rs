//! View engine error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewError {
    /// Template compilation or rendering error
    #[error("Template error: {0}")]
    TemplateError(String),
}
