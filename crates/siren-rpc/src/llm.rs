//! HTTP client for the LLM worker

use crate::contract::{LanguageModel, StreamOptions, TokenStream};
use crate::error::{Error, Result};
use crate::token::{ResponseMetrics, TokenEvent};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const EVENT_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    prompt: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatStreamRequest<'a> {
    prompt: &'a str,
    chunk_threshold: usize,
    sentence_boundary: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    metrics: ResponseMetrics,
}

/// Thin client for the LLM worker's `/chat`, `/chat/stream` and `/warmup`
/// endpoints.
///
/// The streaming endpoint speaks a text event stream; each event is a JSON
/// payload tagged by `type` (see [`TokenEvent`]). Events are forwarded to a
/// channel by a background reader task; no timeout applies between events.
pub struct LlmClient {
    base_url: String,
    client: Client,
    timeout: Duration,
}

impl LlmClient {
    /// Client against `http://{host}:{port}`.
    pub fn new(host: &str, port: u16) -> Result<Self> {
        // No default timeout: it would cut long-lived streams. Unary calls
        // set their own below.
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| Error::Transport(format!("failed to build http client: {e}")))?;
        let base_url = format!("http://{host}:{port}");
        debug!("LLM client initialized for {}", base_url);
        Ok(Self {
            base_url,
            client,
            timeout: DEFAULT_TIMEOUT,
        })
    }
}

#[async_trait]
impl LanguageModel for LlmClient {
    async fn respond(&self, prompt: &str) -> Result<(String, ResponseMetrics)> {
        let response = self
            .client
            .post(format!("{}/chat", self.base_url))
            .timeout(self.timeout)
            .json(&ChatRequest { prompt })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api(format!("chat request failed: {status} - {body}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Api(format!("invalid chat response: {e}")))?;
        Ok((parsed.response, parsed.metrics))
    }

    async fn respond_stream(&self, prompt: &str, options: &StreamOptions) -> Result<TokenStream> {
        let response = self
            .client
            .post(format!("{}/chat/stream", self.base_url))
            .json(&ChatStreamRequest {
                prompt,
                chunk_threshold: options.chunk_threshold,
                sentence_boundary: options.sentence_boundary,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api(format!(
                "stream request failed: {status} - {body}"
            )));
        }

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(item) = stream.next().await {
                let bytes = match item {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        // Transport loss: close the channel without a
                        // terminal event so the consumer falls back.
                        warn!("token stream transport error: {}", e);
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&bytes));

                while let Some(end) = buffer.find("\n\n") {
                    let block: String = buffer.drain(..end + 2).collect();
                    if let Some(event) = parse_event_block(&block) {
                        let terminal = event.is_terminal();
                        if tx.send(event).await.is_err() {
                            return;
                        }
                        if terminal {
                            return;
                        }
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn warmup(&self) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/warmup", self.base_url))
            .timeout(self.timeout)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::Api(format!(
                "warmup request failed: {}",
                response.status()
            )));
        }
        debug!("LLM worker warmed up");
        Ok(())
    }
}

/// Decode one `data:`-framed event block. Malformed payloads are logged
/// and skipped, matching the stream's best-effort contract.
fn parse_event_block(block: &str) -> Option<TokenEvent> {
    for line in block.lines() {
        if let Some(data) = line.strip_prefix("data:") {
            let data = data.trim();
            if data.is_empty() {
                continue;
            }
            match serde_json::from_str::<TokenEvent>(data) {
                Ok(event) => return Some(event),
                Err(e) => {
                    warn!("skipping malformed stream event: {} ({})", e, data);
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_data_framed_chunk() {
        let block = "data: {\"type\": \"chunk\", \"content\": \"hi\"}\n\n";
        assert_eq!(
            parse_event_block(block),
            Some(TokenEvent::Chunk {
                text: "hi".to_string()
            })
        );
    }

    #[test]
    fn skips_malformed_events() {
        assert_eq!(parse_event_block("data: {not json}\n\n"), None);
        assert_eq!(parse_event_block("data:\n\n"), None);
        assert_eq!(parse_event_block(": comment only\n\n"), None);
    }

    #[test]
    fn parses_terminal_error_event() {
        let block = "data: {\"type\": \"error\", \"content\": \"worker died\"}\n\n";
        let event = parse_event_block(block).unwrap();
        assert!(event.is_terminal());
    }

    #[tokio::test]
    async fn stream_against_dead_worker_is_a_transport_error() {
        let client = LlmClient::new("127.0.0.1", 1).unwrap();
        let result = client
            .respond_stream("hello", &StreamOptions::default())
            .await;
        assert!(matches!(result, Err(Error::Transport(_))));
    }
}
