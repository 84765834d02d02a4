//! Error types for visual snapshot operations

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VisualError {
    /// Capture or baseline could not be decoded or encoded
    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    /// Invalid input parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Reading or writing baselines failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
