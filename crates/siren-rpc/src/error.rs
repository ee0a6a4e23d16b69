//! Error types for siren-rpc

use thiserror::Error;

/// RPC and supervision error type
#[derive(Debug, Error)]
pub enum Error {
    /// Communication with a worker failed (connection, timeout, protocol)
    #[error("transport error: {0}")]
    Transport(String),

    /// A worker answered with a non-success status
    #[error("worker api error: {0}")]
    Api(String),

    /// Transcription failed inside the STT worker
    #[error("transcription error: {0}")]
    Transcription(String),

    /// Synthesis failed inside the TTS worker
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// A worker failed to start or become ready
    #[error("service '{service}' failed to initialize: {cause}")]
    ServiceInit {
        /// Worker name
        service: String,
        /// What went wrong
        cause: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Transport(e.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
