//! Intent detection and handler dispatch
//!
//! Some requests never reach the language model: notes, memories, web
//! search and file search are claimed by handlers on the LLM path. When a
//! handler claims an input, downstream consumers see a single `Complete`
//! token event carrying the handler's output and no chunks.

mod file_search;
mod memory;
mod note;
mod web_search;

pub use file_search::FileSearchHandler;
pub use memory::MemoryHandler;
pub use note::NoteHandler;
pub use web_search::WebSearchHandler;

use crate::error::Result;
use async_trait::async_trait;
use regex::Regex;
use siren_rpc::{LanguageModel, ResponseMetrics, StreamOptions, TokenEvent, TokenStream};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// High-level request category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    /// Plain conversation; goes to the language model.
    Default,
    /// Memory file commands.
    Memory,
    /// Local document search.
    FileSearch,
    /// Web search with summarization.
    WebSearch,
    /// Note taking.
    Note,
}

impl Intent {
    /// Wire label used in token events and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Intent::Default => "default",
            Intent::Memory => "memory",
            Intent::FileSearch => "file_search",
            Intent::WebSearch => "web_search",
            Intent::Note => "note",
        }
    }
}

/// Regex-based intent detection over the transcribed text.
pub struct IntentDetector {
    file_search: Regex,
    memory: Regex,
    web_search: Regex,
    note: Regex,
}

impl Default for IntentDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentDetector {
    /// Build the detector. The patterns are fixed.
    #[must_use]
    pub fn new() -> Self {
        let case_insensitive = |pattern: &str| {
            Regex::new(&format!("(?i){pattern}")).expect("intent pattern must compile")
        };
        Self {
            file_search: case_insensitive(r"\b(find|search|locate|where is|look up)\b"),
            memory: case_insensitive(r"\b(remember to|update memory|remove memory|list memories|what do you remember)\b"),
            web_search: case_insensitive(r"\b(search the web|web search|google|duckduckgo|bing|online)\b"),
            note: case_insensitive(r"\b(note|notes|take a note|delete note|show notes)\b"),
        }
    }

    /// Classify one utterance.
    #[must_use]
    pub fn detect(&self, text: &str) -> Intent {
        let text = text.trim();
        if self.memory.is_match(text) {
            Intent::Memory
        } else if self.note.is_match(text) {
            Intent::Note
        } else if self.web_search.is_match(text) {
            Intent::WebSearch
        } else if self.file_search.is_match(text) {
            Intent::FileSearch
        } else {
            Intent::Default
        }
    }
}

/// One intent handler.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Whether this handler wants the input.
    fn claims(&self, text: &str) -> bool;

    /// Produce the reply for a claimed input.
    async fn handle(&self, text: &str) -> Result<String>;
}

/// Maps intent variants to their implementations.
#[derive(Default)]
pub struct HandlerRegistry {
    entries: Vec<(Intent, Arc<dyn Handler>)>,
}

impl HandlerRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for an intent. Later registrations win.
    #[must_use]
    pub fn with(mut self, intent: Intent, handler: Arc<dyn Handler>) -> Self {
        self.entries.push((intent, handler));
        self
    }

    /// The handler for `intent`, if any.
    #[must_use]
    pub fn get(&self, intent: Intent) -> Option<&Arc<dyn Handler>> {
        self.entries
            .iter()
            .rev()
            .find(|(i, _)| *i == intent)
            .map(|(_, h)| h)
    }
}

/// [`LanguageModel`] wrapper that dispatches claimed intents to handlers
/// and delegates everything else to the inner model.
///
/// On the streaming surface, a handled request becomes a two-event stream:
/// the detected `Intent` followed by one `Complete` with the handler's
/// output.
pub struct LlmRouter {
    inner: Arc<dyn LanguageModel>,
    detector: IntentDetector,
    registry: HandlerRegistry,
}

impl LlmRouter {
    /// Router around `inner` dispatching through `registry`.
    #[must_use]
    pub fn new(inner: Arc<dyn LanguageModel>, registry: HandlerRegistry) -> Self {
        Self {
            inner,
            detector: IntentDetector::new(),
            registry,
        }
    }

    async fn dispatch(&self, prompt: &str) -> Option<(Intent, Result<String>)> {
        let intent = self.detector.detect(prompt);
        if intent == Intent::Default {
            return None;
        }
        let handler = self.registry.get(intent)?;
        if !handler.claims(prompt) {
            debug!("intent {} detected but handler declined", intent.as_str());
            return None;
        }
        info!("dispatching to {} handler", intent.as_str());
        Some((intent, handler.handle(prompt).await))
    }
}

#[async_trait]
impl LanguageModel for LlmRouter {
    async fn respond(&self, prompt: &str) -> siren_rpc::Result<(String, ResponseMetrics)> {
        if let Some((intent, outcome)) = self.dispatch(prompt).await {
            return match outcome {
                Ok(reply) => Ok((reply, ResponseMetrics::default())),
                Err(e) => Err(siren_rpc::Error::Api(format!(
                    "{} handler failed: {e}",
                    intent.as_str()
                ))),
            };
        }
        self.inner.respond(prompt).await
    }

    async fn respond_stream(
        &self,
        prompt: &str,
        options: &StreamOptions,
    ) -> siren_rpc::Result<TokenStream> {
        if let Some((intent, outcome)) = self.dispatch(prompt).await {
            let (tx, rx) = mpsc::channel(4);
            let _ = tx.try_send(TokenEvent::Intent {
                label: intent.as_str().to_string(),
            });
            match outcome {
                Ok(reply) => {
                    let _ = tx.try_send(TokenEvent::Complete {
                        full_text: reply,
                        metrics: ResponseMetrics::default(),
                    });
                }
                Err(e) => {
                    warn!("{} handler failed: {}", intent.as_str(), e);
                    let _ = tx.try_send(TokenEvent::Error {
                        message: e.to_string(),
                    });
                }
            }
            return Ok(rx);
        }
        self.inner.respond_stream(prompt, options).await
    }

    async fn warmup(&self) -> siren_rpc::Result<()> {
        self.inner.warmup().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detector_routes_the_canonical_phrases() {
        let detector = IntentDetector::new();
        assert_eq!(detector.detect("take a note buy milk"), Intent::Note);
        assert_eq!(detector.detect("remember to water the plants"), Intent::Memory);
        assert_eq!(detector.detect("search the web for rust news"), Intent::WebSearch);
        assert_eq!(detector.detect("where is my tax report"), Intent::FileSearch);
        assert_eq!(detector.detect("tell me a joke"), Intent::Default);
    }

    #[test]
    fn memory_wins_over_file_search_keywords() {
        // "list memories" must not be swallowed by the generic verbs.
        let detector = IntentDetector::new();
        assert_eq!(detector.detect("list memories"), Intent::Memory);
    }

    struct EchoModel;

    #[async_trait]
    impl LanguageModel for EchoModel {
        async fn respond(&self, prompt: &str) -> siren_rpc::Result<(String, ResponseMetrics)> {
            Ok((format!("echo: {prompt}"), ResponseMetrics::default()))
        }

        async fn respond_stream(
            &self,
            prompt: &str,
            _options: &StreamOptions,
        ) -> siren_rpc::Result<TokenStream> {
            let (tx, rx) = mpsc::channel(4);
            let _ = tx.try_send(TokenEvent::Complete {
                full_text: format!("echo: {prompt}"),
                metrics: ResponseMetrics::default(),
            });
            Ok(rx)
        }

        async fn warmup(&self) -> siren_rpc::Result<()> {
            Ok(())
        }
    }

    struct CannedHandler;

    #[async_trait]
    impl Handler for CannedHandler {
        fn claims(&self, _text: &str) -> bool {
            true
        }

        async fn handle(&self, _text: &str) -> Result<String> {
            Ok("Got it. Note saved.".to_string())
        }
    }

    #[tokio::test]
    async fn claimed_input_streams_intent_then_single_complete() {
        let router = LlmRouter::new(
            Arc::new(EchoModel),
            HandlerRegistry::new().with(Intent::Note, Arc::new(CannedHandler)),
        );

        let mut rx = router
            .respond_stream("take a note buy milk", &StreamOptions::default())
            .await
            .unwrap();

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            TokenEvent::Intent {
                label: "note".to_string()
            }
        );
        match &events[1] {
            TokenEvent::Complete { full_text, .. } => {
                assert_eq!(full_text, "Got it. Note saved.");
            }
            other => panic!("expected complete, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unclaimed_input_reaches_the_inner_model() {
        let router = LlmRouter::new(Arc::new(EchoModel), HandlerRegistry::new());
        let (reply, _) = router.respond("tell me a joke").await.unwrap();
        assert_eq!(reply, "echo: tell me a joke");
    }
}
