//! Local file search handler

use crate::error::{Error, Result};
use crate::handlers::Handler;
use crate::text::ResponseText;
use async_trait::async_trait;
use regex::Regex;
use siren_search::{DocumentIndex, EmbeddingProvider, MiniLmEmbedder};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

const TOP_K: usize = 10;
const SPOKEN_RESULTS: usize = 5;

struct Loaded {
    embedder: Arc<dyn EmbeddingProvider>,
    index: DocumentIndex,
}

/// Answers "find/where is" questions against the persisted document
/// index. The embedding model and index are loaded lazily on the first
/// query so assistant startup stays fast.
pub struct FileSearchHandler {
    index_dir: PathBuf,
    text: Arc<ResponseText>,
    claim: Regex,
    loaded: Mutex<Option<Loaded>>,
}

impl FileSearchHandler {
    /// Handler over the index persisted in `index_dir`.
    #[must_use]
    pub fn new(index_dir: impl Into<PathBuf>, text: Arc<ResponseText>) -> Self {
        Self {
            index_dir: index_dir.into(),
            text,
            claim: Regex::new(r"(?i)\b(find|search|locate|where is|look up)\b")
                .expect("file search pattern must compile"),
            loaded: Mutex::new(None),
        }
    }

    async fn query(&self, text: &str) -> Result<Vec<String>> {
        let mut guard = self.loaded.lock().await;
        if guard.is_none() {
            let embedder = MiniLmEmbedder::new()?;
            let index = DocumentIndex::open(&self.index_dir)?;
            *guard = Some(Loaded {
                embedder: Arc::new(embedder),
                index,
            });
        }
        let loaded = guard
            .as_ref()
            .ok_or_else(|| Error::Handler("index failed to load".to_string()))?;

        let vector = loaded.embedder.embed(text).await?;
        let matches = loaded.index.search(&vector, TOP_K)?;
        debug!("file search returned {} matches", matches.len());
        Ok(matches.into_iter().map(|m| m.id).collect())
    }
}

#[async_trait]
impl Handler for FileSearchHandler {
    fn claims(&self, text: &str) -> bool {
        self.claim.is_match(text)
    }

    async fn handle(&self, text: &str) -> Result<String> {
        if !self.index_dir.exists() {
            return Ok(self.text.get("search.no_index"));
        }

        let paths = self.query(text).await?;
        if paths.is_empty() {
            return Ok(self.text.get("search.none"));
        }

        let count = paths.len();
        let plural = if count == 1 { "" } else { "s" };
        let mut reply = self.text.format(
            "search.found_prefix",
            &[("count", count.to_string()), ("plural", plural.to_string())],
        );
        for path in paths.iter().take(SPOKEN_RESULTS) {
            let stem = Path::new(path)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.clone());
            reply.push_str("\n- ");
            reply.push_str(&stem);
        }
        Ok(reply)
    }
}
