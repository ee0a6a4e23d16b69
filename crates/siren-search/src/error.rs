//! Error types for siren-search

use thiserror::Error;

/// Search and indexing error type
#[derive(Debug, Error)]
pub enum Error {
    /// Vector index operation failed
    #[error("index error: {0}")]
    Index(String),

    /// Query execution failed
    #[error("search error: {0}")]
    Search(String),

    /// Embedding generation failed
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Vector has the wrong number of dimensions
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Configured index dimensions
        expected: usize,
        /// Dimensions of the offending vector
        actual: usize,
    },

    /// Search configuration missing or malformed
    #[error("search config error: {0}")]
    Config(String),

    /// Persistence (de)serialization failed
    #[error("serialization error: {0}")]
    Serialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
