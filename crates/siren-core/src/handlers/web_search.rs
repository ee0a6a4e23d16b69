//! Web search handler

use crate::error::{Error, Result};
use crate::handlers::Handler;
use crate::text::ResponseText;
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use siren_rpc::LanguageModel;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const SEARCH_ENDPOINT: &str = "https://api.tavily.com/search";
const SEARCH_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_RESULTS: usize = 3;

/// Environment variable holding the search API key.
pub const API_KEY_VAR: &str = "TAVILY_API_KEY";

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'a str,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    url: String,
}

/// Answers web questions by searching and summarizing the hits through
/// the language model. Without an API key the handler claims nothing, so
/// web questions fall through to plain conversation.
pub struct WebSearchHandler {
    llm: Arc<dyn LanguageModel>,
    text: Arc<ResponseText>,
    client: reqwest::Client,
    api_key: Option<String>,
    claim: Regex,
}

impl WebSearchHandler {
    /// Handler summarizing through `llm`; the key comes from the
    /// environment.
    #[must_use]
    pub fn new(llm: Arc<dyn LanguageModel>, text: Arc<ResponseText>) -> Self {
        Self::with_api_key(llm, text, std::env::var(API_KEY_VAR).ok())
    }

    /// Handler with an explicit key (or none).
    #[must_use]
    pub fn with_api_key(
        llm: Arc<dyn LanguageModel>,
        text: Arc<ResponseText>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            llm,
            text,
            client: reqwest::Client::new(),
            api_key,
            claim: Regex::new(r"(?i)\b(search the web|web search|google|duckduckgo|bing|online)\b")
                .expect("web pattern must compile"),
        }
    }

    async fn search(&self, api_key: &str, query: &str) -> Result<Vec<SearchHit>> {
        let response = self
            .client
            .post(SEARCH_ENDPOINT)
            .timeout(SEARCH_TIMEOUT)
            .json(&SearchRequest {
                api_key,
                query,
                search_depth: "basic",
                max_results: MAX_RESULTS,
            })
            .send()
            .await
            .map_err(|e| Error::Handler(format!("web search failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Handler(format!(
                "web search failed: {}",
                response.status()
            )));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| Error::Handler(format!("bad search response: {e}")))?;
        Ok(parsed.results)
    }
}

#[async_trait]
impl Handler for WebSearchHandler {
    fn claims(&self, text: &str) -> bool {
        self.api_key.is_some() && self.claim.is_match(text)
    }

    async fn handle(&self, text: &str) -> Result<String> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Ok(self.text.get("web.none"));
        };

        let hits = self.search(api_key, text).await?;
        if hits.is_empty() {
            return Ok(self.text.get("web.none"));
        }
        debug!("summarizing {} web results", hits.len());

        let sources = hits
            .iter()
            .enumerate()
            .map(|(i, hit)| format!("[{}] {}\n{}\n(Source: {})", i + 1, hit.title, hit.content, hit.url))
            .collect::<Vec<_>>()
            .join("\n\n");

        let prompt = format!(
            "{}\n\nUser asked: {}\n\n[WEB RESULTS]\n{}\n[/WEB RESULTS]",
            self.text.get("web.summary_prefix"),
            text,
            sources
        );

        let (summary, _metrics) = self.llm.respond(&prompt).await?;
        Ok(summary)
    }
}
