//! Siren Core - Conversation orchestration
//!
//! Everything between a wake event and the spoken reply lives here:
//! - the conversation state machine ([`ConversationController`])
//! - the streaming LLM→TTS bridge ([`StreamingBridge`])
//! - session state (persona, memories, dialog history)
//! - intent handlers dispatched on the LLM path
//! - performance and transcription logging
//! - the application configuration surface

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bridge;
pub mod config;
pub mod controller;
pub mod error;
pub mod handlers;
pub mod perf;
pub mod session;
pub mod text;

pub use bridge::{BridgeOutcome, StreamingBridge};
pub use config::AppConfig;
pub use controller::{ConversationController, ConversationEvent, ConversationState};
pub use error::{Error, Result};
pub use handlers::{Handler, HandlerRegistry, Intent, IntentDetector, LlmRouter};
pub use perf::{PerfLog, TranscriptionLog};
pub use session::Session;
pub use text::ResponseText;
