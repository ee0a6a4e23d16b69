//! HTTP client for the STT worker

use crate::contract::SpeechToText;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Bytes in half a second of 16 kHz mono 16-bit PCM. Anything shorter is
/// not worth a worker round-trip.
const MIN_PCM_BYTES: usize = 16_000;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TranscribeResponse {
    #[serde(default)]
    transcription: String,
}

/// Thin client for the STT worker's `/transcribe` endpoint.
pub struct SttClient {
    base_url: String,
    client: Client,
}

impl SttClient {
    /// Client against `http://{host}:{port}`.
    pub fn new(host: &str, port: u16) -> Result<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| Error::Transport(format!("failed to build http client: {e}")))?;
        let base_url = format!("http://{host}:{port}");
        debug!("STT client initialized for {}", base_url);
        Ok(Self { base_url, client })
    }
}

#[async_trait]
impl SpeechToText for SttClient {
    async fn transcribe(&self, pcm: &[u8]) -> Result<String> {
        if pcm.len() < MIN_PCM_BYTES {
            debug!(
                "utterance too short to transcribe ({} bytes), returning empty",
                pcm.len()
            );
            return Ok(String::new());
        }

        let part = Part::bytes(pcm.to_vec())
            .file_name("audio.raw")
            .mime_str("application/octet-stream")
            .map_err(|e| Error::Transport(format!("invalid multipart: {e}")))?;
        let form = Form::new().part("audio", part);

        let response = self
            .client
            .post(format!("{}/transcribe", self.base_url))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Transcription(format!(
                "transcribe request failed: {status} - {body}"
            )));
        }

        let parsed: TranscribeResponse = response
            .json()
            .await
            .map_err(|e| Error::Transcription(format!("invalid transcribe response: {e}")))?;
        let text = parsed.transcription.trim().to_string();
        debug!("transcription completed: '{}'", text);
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn short_audio_transcribes_to_empty_without_rpc() {
        // Port 1 is never listening; a round-trip attempt would error.
        let client = SttClient::new("127.0.0.1", 1).unwrap();
        let short = vec![0u8; MIN_PCM_BYTES - 2];
        assert_eq!(client.transcribe(&short).await.unwrap(), "");
    }

    #[tokio::test]
    async fn empty_audio_transcribes_to_empty() {
        let client = SttClient::new("127.0.0.1", 1).unwrap();
        assert_eq!(client.transcribe(&[]).await.unwrap(), "");
    }
}
