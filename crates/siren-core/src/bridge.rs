//! Streaming LLM→TTS bridge

use crate::error::Result;
use crate::perf::PerfLog;
use siren_rpc::{LanguageModel, SpeechSynth, StreamOptions, TokenEvent};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// What a finished response looked like.
#[derive(Debug, Clone)]
pub struct BridgeOutcome {
    /// Canonical response text for history and the dialog log.
    pub text: String,
    /// TTS submissions made for this response.
    pub chunks_submitted: usize,
    /// Model latency to the first token, when streamed.
    pub first_token_s: Option<f64>,
    /// Whether the non-streaming path produced (or tried to produce) the
    /// response.
    pub used_fallback: bool,
}

/// Buffers token events into synthesis-sized text and forwards them to the
/// TTS adapter in generation order.
///
/// Chunk *n*'s synthesis request is always issued before chunk *n+1*'s;
/// the bridge never waits for audio completion, the worker queues segments
/// gaplessly. A stream that cannot start, or dies without a terminal
/// event, degrades to the whole-response path; if that fails too, whatever
/// accumulated is spoken once.
pub struct StreamingBridge {
    min_chunk_size: usize,
    sentence_boundary: bool,
    stream_options: StreamOptions,
    perf: Arc<PerfLog>,
}

impl StreamingBridge {
    /// Bridge with the given chunking policy.
    #[must_use]
    pub fn new(
        min_chunk_size: usize,
        sentence_boundary: bool,
        stream_options: StreamOptions,
        perf: Arc<PerfLog>,
    ) -> Self {
        Self {
            min_chunk_size,
            sentence_boundary,
            stream_options,
            perf,
        }
    }

    /// Stream the model's reply to `prompt` into `tts`.
    ///
    /// `response_started` anchors the transcription-to-first-audio latency
    /// checkpoint.
    pub async fn speak_response(
        &self,
        llm: &dyn LanguageModel,
        tts: &dyn SpeechSynth,
        prompt: &str,
        response_started: Instant,
    ) -> Result<BridgeOutcome> {
        let mut events = match llm.respond_stream(prompt, &self.stream_options).await {
            Ok(events) => events,
            Err(e) => {
                warn!("token stream failed to start, using whole response: {}", e);
                return self.whole_response(llm, tts, prompt, response_started).await;
            }
        };

        let mut accumulator = String::new();
        let mut collected = String::new();
        let mut chunks_submitted = 0usize;
        let mut first_token_s = None;

        while let Some(event) = events.recv().await {
            match event {
                TokenEvent::Intent { label } => {
                    debug!("stream intent: {}", label);
                }
                TokenEvent::FirstToken { elapsed_s } => {
                    first_token_s = Some(elapsed_s);
                    self.perf.record(
                        "llm_first_token",
                        Duration::from_secs_f64(elapsed_s.max(0.0)),
                        serde_json::Value::Null,
                    );
                }
                TokenEvent::Chunk { text } => {
                    accumulator.push_str(&text);
                    collected.push_str(&text);

                    let boundary = self.sentence_boundary && ends_sentence(&accumulator);
                    if accumulator.len() >= self.min_chunk_size || boundary {
                        let cut = find_break_point(&accumulator);
                        if cut > 0 {
                            let chunk: String = accumulator.drain(..cut).collect();
                            self.submit(tts, &chunk, &mut chunks_submitted, response_started)
                                .await?;
                        }
                    }
                }
                TokenEvent::Complete { full_text, metrics } => {
                    if !accumulator.trim().is_empty() {
                        let tail = std::mem::take(&mut accumulator);
                        self.submit(tts, &tail, &mut chunks_submitted, response_started)
                            .await?;
                    } else if chunks_submitted == 0 && !full_text.trim().is_empty() {
                        // Handler-style streams carry their whole output in
                        // the terminal event.
                        self.submit(tts, &full_text, &mut chunks_submitted, response_started)
                            .await?;
                    }

                    self.perf.record(
                        "llm_response",
                        Duration::from_secs_f64(metrics.total_duration.max(0.0)),
                        serde_json::json!({
                            "chars": full_text.len(),
                            "tokens_per_second": metrics.tokens_per_second,
                        }),
                    );
                    if full_text.len() < collected.len() {
                        debug!(
                            "complete text shorter than streamed chunks ({} < {})",
                            full_text.len(),
                            collected.len()
                        );
                    }

                    info!(
                        "response finished: {} chars in {} submissions",
                        full_text.len(),
                        chunks_submitted
                    );
                    return Ok(BridgeOutcome {
                        text: full_text,
                        chunks_submitted,
                        first_token_s,
                        used_fallback: false,
                    });
                }
                TokenEvent::Error { message } => {
                    warn!("worker reported stream error: {}", message);
                    if !accumulator.trim().is_empty() {
                        let tail = std::mem::take(&mut accumulator);
                        if let Err(e) = self
                            .submit(tts, &tail, &mut chunks_submitted, response_started)
                            .await
                        {
                            warn!("failed to speak partial response: {}", e);
                        }
                    }
                    return Ok(BridgeOutcome {
                        text: collected,
                        chunks_submitted,
                        first_token_s,
                        used_fallback: false,
                    });
                }
            }
        }

        // The channel closed without a terminal event: the transport died
        // mid-stream. Retry on the whole-response path before settling for
        // the partial text.
        warn!("token stream ended without a terminal event, retrying whole response");
        match self.whole_response(llm, tts, prompt, response_started).await {
            Ok(mut outcome) => {
                outcome.first_token_s = first_token_s;
                Ok(outcome)
            }
            Err(e) => {
                warn!("whole-response fallback failed as well: {}", e);
                if !accumulator.trim().is_empty() {
                    if let Err(e) = self
                        .submit(tts, &accumulator, &mut chunks_submitted, response_started)
                        .await
                    {
                        warn!("failed to speak partial response: {}", e);
                    }
                }
                Ok(BridgeOutcome {
                    text: collected,
                    chunks_submitted,
                    first_token_s,
                    used_fallback: true,
                })
            }
        }
    }

    async fn whole_response(
        &self,
        llm: &dyn LanguageModel,
        tts: &dyn SpeechSynth,
        prompt: &str,
        response_started: Instant,
    ) -> Result<BridgeOutcome> {
        let (text, metrics) = llm.respond(prompt).await?;
        self.perf.record(
            "llm_response",
            Duration::from_secs_f64(metrics.total_duration.max(0.0)),
            serde_json::json!({"chars": text.len(), "streaming": false}),
        );

        let mut chunks_submitted = 0usize;
        if !text.trim().is_empty() {
            self.submit(tts, &text, &mut chunks_submitted, response_started)
                .await?;
        }
        Ok(BridgeOutcome {
            text,
            chunks_submitted,
            first_token_s: None,
            used_fallback: true,
        })
    }

    async fn submit(
        &self,
        tts: &dyn SpeechSynth,
        chunk: &str,
        chunks_submitted: &mut usize,
        response_started: Instant,
    ) -> Result<()> {
        let trimmed = chunk.trim();
        if trimmed.is_empty() {
            return Ok(());
        }
        if *chunks_submitted == 0 {
            self.perf.record(
                "transcription_to_first_tts_chunk",
                response_started.elapsed(),
                serde_json::Value::Null,
            );
        }
        tts.speak(trimmed).await?;
        *chunks_submitted += 1;
        debug!("submitted chunk {} ({} chars)", chunks_submitted, trimmed.len());
        Ok(())
    }
}

/// Whether the accumulated text ends a sentence.
fn ends_sentence(text: &str) -> bool {
    matches!(text.trim_end().chars().last(), Some('.' | '?' | '!'))
}

/// Best split position scanning right-to-left: sentence punctuation, then
/// clause punctuation, then a space, else the full buffer.
#[must_use]
pub fn find_break_point(text: &str) -> usize {
    for chars in [&['.', '!', '?'][..], &[',', ':', ';'][..], &[' '][..]] {
        if let Some(pos) = text.rfind(chars) {
            return pos + 1;
        }
    }
    text.len()
}
