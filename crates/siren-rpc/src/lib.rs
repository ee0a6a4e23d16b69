//! Siren RPC - Worker adapters and supervision
//!
//! The heavyweight models (STT, LLM, TTS) run as independent worker
//! processes behind loopback HTTP. This crate owns:
//! - the abstract worker contracts ([`SpeechToText`], [`LanguageModel`],
//!   [`SpeechSynth`])
//! - thin HTTP clients implementing them against the local workers
//! - the token-event stream spoken by the LLM worker
//! - the [`Supervisor`] that spawns, readiness-probes and tears down the
//!   worker processes
//!
//! The host process never shares memory with a worker; every interaction
//! goes through these adapters.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod contract;
pub mod error;
pub mod llm;
pub mod stt;
pub mod supervisor;
pub mod token;
pub mod tts;

pub use contract::{LanguageModel, SpeechSynth, SpeechToText, StreamOptions, TokenStream};
pub use error::{Error, Result};
pub use llm::LlmClient;
pub use stt::SttClient;
pub use supervisor::{ServiceHandle, Supervisor, WorkerSpec};
pub use token::{ResponseMetrics, TokenEvent};
pub use tts::TtsClient;

/// Default loopback host for all workers.
pub const WORKER_HOST: &str = "127.0.0.1";

/// Default TTS worker port.
pub const TTS_PORT: u16 = 8001;

/// Default STT worker port.
pub const STT_PORT: u16 = 8002;

/// Default LLM worker port.
pub const LLM_PORT: u16 = 8003;
