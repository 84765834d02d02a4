//! Error handling module
//!
//! One error type for the harness; crate-level errors convert into it.

use network_intercept::InterceptError;
use thiserror::Error;
use visual_snapshot::VisualError;

#[derive(Debug, Error)]
pub enum HarnessError {
    /// Invalid or unreadable configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// A story id that is not in the catalogue
    #[error("unknown story: {0}")]
    UnknownStory(String),

    #[error(transparent)]
    Intercept(#[from] InterceptError),

    #[error(transparent)]
    Visual(#[from] VisualError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarnessError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
