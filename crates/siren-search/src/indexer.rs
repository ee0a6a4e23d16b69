//! Document indexer (the `--index` subtool)

use crate::embed::EmbeddingProvider;
use crate::error::{Error, Result};
use crate::index::DocumentIndex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

/// File extensions treated as indexable text.
const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "rst", "org", "csv", "json", "toml", "yaml", "yml", "py", "rs", "sh",
];

/// At most this much of each file is embedded.
const MAX_CONTENT_BYTES: usize = 16 * 1024;

#[derive(Debug, Deserialize)]
struct SearchConfig {
    #[serde(default)]
    search_paths: Vec<PathBuf>,
}

/// Builds the document index from the directories listed in the search
/// configuration. Runs standalone; never touches the microphone or the
/// workers.
pub struct DocumentIndexer<E> {
    embedder: E,
    config_path: PathBuf,
    index_dir: PathBuf,
}

impl<E: EmbeddingProvider> DocumentIndexer<E> {
    /// Indexer reading `config_path` and persisting under `index_dir`.
    pub fn new(
        embedder: E,
        config_path: impl Into<PathBuf>,
        index_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            embedder,
            config_path: config_path.into(),
            index_dir: index_dir.into(),
        }
    }

    fn load_search_paths(&self) -> Result<Vec<PathBuf>> {
        let raw = std::fs::read_to_string(&self.config_path).map_err(|e| {
            Error::Config(format!(
                "cannot read {}: {e}",
                self.config_path.display()
            ))
        })?;
        let config: SearchConfig = serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("bad search config: {e}")))?;

        let (existing, missing): (Vec<_>, Vec<_>) = config
            .search_paths
            .into_iter()
            .partition(|p| p.exists());
        for path in missing {
            warn!("skipping missing search path {}", path.display());
        }
        Ok(existing)
    }

    fn collect_files(paths: &[PathBuf]) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for root in paths {
            for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
                let path = entry.path();
                if !entry.file_type().is_file() {
                    continue;
                }
                let indexable = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|ext| TEXT_EXTENSIONS.contains(&ext.to_lowercase().as_str()));
                if indexable {
                    files.push(path.to_path_buf());
                }
            }
        }
        files
    }

    fn read_content(path: &Path) -> Option<String> {
        let mut content = std::fs::read_to_string(path).ok()?;
        if content.trim().is_empty() {
            return None;
        }
        if content.len() > MAX_CONTENT_BYTES {
            let mut cut = MAX_CONTENT_BYTES;
            while !content.is_char_boundary(cut) {
                cut -= 1;
            }
            content.truncate(cut);
        }
        Some(content)
    }

    /// Build and persist the index. Returns the number of documents
    /// indexed.
    pub async fn run(&self) -> Result<usize> {
        let paths = self.load_search_paths()?;
        if paths.is_empty() {
            warn!("no valid search paths configured, nothing to index");
            return Ok(0);
        }

        let files = Self::collect_files(&paths);
        info!("Indexing {} candidate files", files.len());

        let mut index = DocumentIndex::create(&self.index_dir, self.embedder.dimensions())?;
        let mut indexed = 0usize;
        for path in files {
            let Some(content) = Self::read_content(&path) else {
                continue;
            };
            match self.embedder.embed(&content).await {
                Ok(vector) => {
                    index.add(&path.to_string_lossy(), &vector)?;
                    indexed += 1;
                }
                Err(e) => warn!("failed to embed {}: {}", path.display(), e),
            }
        }

        index.save()?;
        info!("Indexing complete: {} documents", indexed);
        Ok(indexed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::EmbeddingProvider;
    use async_trait::async_trait;
    use tempfile::tempdir;

    /// Deterministic toy embedder: character-class histogram.
    struct HistogramEmbedder;

    #[async_trait]
    impl EmbeddingProvider for HistogramEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let mut v = [0.0f32; 4];
            for c in text.chars() {
                match c {
                    'a'..='m' => v[0] += 1.0,
                    'n'..='z' => v[1] += 1.0,
                    '0'..='9' => v[2] += 1.0,
                    _ => v[3] += 1.0,
                }
            }
            Ok(v.to_vec())
        }

        fn dimensions(&self) -> usize {
            4
        }
    }

    #[tokio::test]
    async fn indexes_listed_directories_and_persists_artifacts() {
        let docs = tempdir().unwrap();
        std::fs::write(docs.path().join("groceries.txt"), "buy milk and bread").unwrap();
        std::fs::write(docs.path().join("notes.md"), "meeting notes for monday").unwrap();
        std::fs::write(docs.path().join("image.bin"), [0u8, 159, 146, 150]).unwrap();

        let out = tempdir().unwrap();
        let config_path = out.path().join("search_config.json");
        std::fs::write(
            &config_path,
            serde_json::json!({
                "search_paths": [docs.path(), out.path().join("missing-dir")]
            })
            .to_string(),
        )
        .unwrap();

        let index_dir = out.path().join("faiss_index");
        let indexer = DocumentIndexer::new(HistogramEmbedder, &config_path, &index_dir);
        let count = indexer.run().await.unwrap();

        assert_eq!(count, 2);
        assert!(index_dir.join("documents.usearch").exists());
        assert!(index_dir.join("documents.mapping.json").exists());

        let index = DocumentIndex::open(&index_dir).unwrap();
        assert_eq!(index.len(), 2);
    }

    #[tokio::test]
    async fn missing_config_is_an_error() {
        let out = tempdir().unwrap();
        let indexer = DocumentIndexer::new(
            HistogramEmbedder,
            out.path().join("nope.json"),
            out.path().join("faiss_index"),
        );
        assert!(matches!(indexer.run().await, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn empty_path_list_indexes_nothing() {
        let out = tempdir().unwrap();
        let config_path = out.path().join("search_config.json");
        std::fs::write(&config_path, r#"{"search_paths": []}"#).unwrap();

        let indexer = DocumentIndexer::new(
            HistogramEmbedder,
            &config_path,
            out.path().join("faiss_index"),
        );
        assert_eq!(indexer.run().await.unwrap(), 0);
    }
}
