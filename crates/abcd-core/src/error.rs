//! Error types for abcd-core.

use thiserror::Error;

/// abcd error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Expression evaluation failed in an event source
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// Index outside the bounds of a grid or matrix
    #[error("Out of range: {0}")]
    OutOfRange(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
