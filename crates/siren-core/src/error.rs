//! Error types for siren-core

use thiserror::Error;

/// Conversation layer error type
#[derive(Debug, Error)]
pub enum Error {
    /// Audio pipeline failure
    #[error(transparent)]
    Audio(#[from] siren_audio::Error),

    /// Worker RPC failure
    #[error(transparent)]
    Rpc(#[from] siren_rpc::Error),

    /// Document search failure
    #[error(transparent)]
    Search(#[from] siren_search::Error),

    /// An intent handler failed
    #[error("handler error: {0}")]
    Handler(String),

    /// Configuration problem
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
