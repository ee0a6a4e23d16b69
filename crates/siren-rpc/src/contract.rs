//! Abstract worker contracts
//!
//! The concrete engines behind STT, LLM and TTS are interchangeable; the
//! rest of the system programs against these traits only.

use crate::error::Result;
use crate::token::{ResponseMetrics, TokenEvent};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Delivery channel for a streamed LLM response.
///
/// Events arrive in generation order. A stream that closes without a
/// terminal [`TokenEvent::Complete`] or [`TokenEvent::Error`] lost its
/// transport; consumers fall back to the non-streaming path.
pub type TokenStream = mpsc::Receiver<TokenEvent>;

/// Tuning for a streamed response.
#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// Minimum characters the worker accumulates before emitting a chunk.
    pub chunk_threshold: usize,
    /// Whether the worker may also emit at sentence boundaries.
    pub sentence_boundary: bool,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            chunk_threshold: 50,
            sentence_boundary: true,
        }
    }
}

/// Speech-to-text worker surface.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe 16 kHz mono 16-bit PCM to text.
    ///
    /// Audio shorter than 0.5 s transcribes to an empty string without an
    /// error or an RPC round-trip.
    async fn transcribe(&self, pcm: &[u8]) -> Result<String>;
}

/// Language-model worker surface.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Request a whole response at once.
    async fn respond(&self, prompt: &str) -> Result<(String, ResponseMetrics)>;

    /// Request a streamed response delivered as token events.
    async fn respond_stream(&self, prompt: &str, options: &StreamOptions) -> Result<TokenStream>;

    /// Precompute model state so the first real request is fast.
    async fn warmup(&self) -> Result<()>;
}

/// Speech-synthesis worker surface.
#[async_trait]
pub trait SpeechSynth: Send + Sync {
    /// Queue a text segment for playback. Returns once the worker accepted
    /// the segment, not when audio finishes; the worker plays segments
    /// gaplessly in submission order.
    async fn speak(&self, text: &str) -> Result<()>;

    /// Precompute synthesis state.
    async fn warmup(&self) -> Result<()>;

    /// Abort playback on the current device.
    async fn stop(&self) -> Result<()>;
}
