//! HTTP client for the TTS worker

use crate::contract::SpeechSynth;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct SpeakRequest<'a> {
    text: &'a str,
}

/// Thin client for the TTS worker's `/speak`, `/warmup` and `/stop`
/// endpoints. The worker queues segments and plays them gaplessly in
/// submission order; `speak` returns once a segment is queued.
pub struct TtsClient {
    base_url: String,
    client: Client,
}

impl TtsClient {
    /// Client against `http://{host}:{port}`.
    pub fn new(host: &str, port: u16) -> Result<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| Error::Transport(format!("failed to build http client: {e}")))?;
        let base_url = format!("http://{host}:{port}");
        debug!("TTS client initialized for {}", base_url);
        Ok(Self { base_url, client })
    }

    async fn post(&self, path: &str, body: Option<SpeakRequest<'_>>) -> Result<()> {
        let mut request = self.client.post(format!("{}{}", self.base_url, path));
        if let Some(body) = &body {
            request = request.json(body);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Synthesis(format!(
                "{path} request failed: {status} - {text}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl SpeechSynth for TtsClient {
    async fn speak(&self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Ok(());
        }
        debug!("queueing {} chars for synthesis", text.len());
        self.post("/speak", Some(SpeakRequest { text })).await
    }

    async fn warmup(&self) -> Result<()> {
        self.post("/warmup", None).await?;
        debug!("TTS worker warmed up");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.post("/stop", None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_text_is_a_no_op() {
        let client = TtsClient::new("127.0.0.1", 1).unwrap();
        assert!(client.speak("   ").await.is_ok());
    }

    #[tokio::test]
    async fn dead_worker_surfaces_synthesis_failure() {
        let client = TtsClient::new("127.0.0.1", 1).unwrap();
        assert!(client.speak("hello").await.is_err());
    }
}
