//! Error types for semqa

use thiserror::Error;

/// Result type alias for semqa operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in semqa operations
#[derive(Error, Debug)]
pub enum Error {
    /// The encoder is unavailable or rejected an input
    #[error("encoding error for {text:?}: {cause}")]
    Encoding { text: String, cause: String },

    /// A vector does not have the store's dimension
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Persisted store artifacts are missing or inconsistent
    #[error("store corrupt: {0}")]
    StoreCorrupt(String),

    /// A query was issued before any store was built or loaded
    #[error("no store has been built or loaded")]
    StoreNotLoaded,

    /// Another rebuild holds the retriever or the store directory
    #[error("rebuild in progress")]
    RebuildInProgress,

    /// Invalid input provided
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Configuration could not be parsed or is out of range
    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn encoding(text: impl Into<String>, cause: impl ToString) -> Self {
        Self::Encoding {
            text: text.into(),
            cause: cause.to_string(),
        }
    }

    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Self::StoreCorrupt(msg.into())
    }
}
