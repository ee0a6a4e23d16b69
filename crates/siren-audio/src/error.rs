//! Error types for siren-audio

use thiserror::Error;

/// Audio pipeline error type
#[derive(Debug, Error)]
pub enum Error {
    /// No frame could be delivered right now; the caller may retry.
    #[error("audio unavailable: {0}")]
    AudioUnavailable(String),

    /// The capture device is gone; the pipeline cannot continue.
    #[error("capture device lost: {0}")]
    DeviceLost(String),

    /// Audio stream setup or playback error
    #[error("audio stream error: {0}")]
    Stream(String),

    /// Wake-word model file missing on disk
    #[error("wake model not found: {0}")]
    ModelMissing(String),

    /// Wake-word model load or inference error
    #[error("wake model error: {0}")]
    Model(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
