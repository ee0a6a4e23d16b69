//! Persistent vector index over local documents

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use usearch::ffi::{IndexOptions, MetricKind, ScalarKind};

const INDEX_FILE: &str = "documents.usearch";
const MAPPING_FILE: &str = "documents.mapping.json";
const INITIAL_CAPACITY: usize = 4096;
const CONNECTIVITY: usize = 16;
const EXPANSION_ADD: usize = 128;
const EXPANSION_SEARCH: usize = 64;

/// One search hit: a document id (file path) and its cosine similarity.
#[derive(Debug, Clone)]
pub struct DocumentMatch {
    /// Document id, as registered at indexing time.
    pub id: String,
    /// Similarity in [0, 1]; higher is closer.
    pub score: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct Mapping {
    dimensions: usize,
    entries: Vec<(String, u64)>,
}

/// Cosine HNSW index with a sidecar id mapping, persisted as two files
/// inside a directory.
pub struct DocumentIndex {
    index: usearch::Index,
    id_to_key: HashMap<String, u64>,
    key_to_id: HashMap<u64, String>,
    next_key: u64,
    dimensions: usize,
    dir: PathBuf,
}

impl DocumentIndex {
    fn options(dimensions: usize) -> IndexOptions {
        IndexOptions {
            dimensions,
            metric: MetricKind::Cos,
            quantization: ScalarKind::F32,
            connectivity: CONNECTIVITY,
            expansion_add: EXPANSION_ADD,
            expansion_search: EXPANSION_SEARCH,
            multi: false,
        }
    }

    /// Create an empty index that will persist into `dir`.
    pub fn create(dir: impl Into<PathBuf>, dimensions: usize) -> Result<Self> {
        let index = usearch::Index::new(&Self::options(dimensions))
            .map_err(|e| Error::Index(format!("failed to create index: {e}")))?;
        index
            .reserve(INITIAL_CAPACITY)
            .map_err(|e| Error::Index(format!("failed to reserve capacity: {e}")))?;

        Ok(Self {
            index,
            id_to_key: HashMap::new(),
            key_to_id: HashMap::new(),
            next_key: 1,
            dimensions,
            dir: dir.into(),
        })
    }

    /// Load a previously persisted index from `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let index_path = dir.join(INDEX_FILE);
        let mapping_path = dir.join(MAPPING_FILE);
        if !index_path.exists() || !mapping_path.exists() {
            return Err(Error::Index(format!(
                "no index found under {}",
                dir.display()
            )));
        }

        let mapping: Mapping = serde_json::from_str(&std::fs::read_to_string(&mapping_path)?)
            .map_err(|e| Error::Serialization(format!("bad mapping file: {e}")))?;

        let index = usearch::Index::new(&Self::options(mapping.dimensions))
            .map_err(|e| Error::Index(format!("failed to create index: {e}")))?;
        let path_str = index_path
            .to_str()
            .ok_or_else(|| Error::Index("index path is not valid UTF-8".to_string()))?;
        index
            .load(path_str)
            .map_err(|e| Error::Index(format!("failed to load index: {e}")))?;

        let next_key = mapping.entries.iter().map(|(_, k)| *k).max().unwrap_or(0) + 1;
        let id_to_key: HashMap<String, u64> = mapping.entries.iter().cloned().collect();
        let key_to_id: HashMap<u64, String> = mapping
            .entries
            .into_iter()
            .map(|(id, key)| (key, id))
            .collect();

        info!(
            "Loaded document index with {} entries from {}",
            id_to_key.len(),
            dir.display()
        );

        Ok(Self {
            index,
            id_to_key,
            key_to_id,
            next_key,
            dimensions: mapping.dimensions,
            dir: dir.to_path_buf(),
        })
    }

    /// Persist both the vectors and the id mapping.
    pub fn save(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let index_path = self.dir.join(INDEX_FILE);
        let path_str = index_path
            .to_str()
            .ok_or_else(|| Error::Index("index path is not valid UTF-8".to_string()))?;
        self.index
            .save(path_str)
            .map_err(|e| Error::Index(format!("failed to save index: {e}")))?;

        let mapping = Mapping {
            dimensions: self.dimensions,
            entries: self.id_to_key.iter().map(|(id, k)| (id.clone(), *k)).collect(),
        };
        let json = serde_json::to_string_pretty(&mapping)
            .map_err(|e| Error::Serialization(format!("mapping serialize failed: {e}")))?;
        std::fs::write(self.dir.join(MAPPING_FILE), json)?;

        info!(
            "Saved document index ({} entries) to {}",
            self.id_to_key.len(),
            self.dir.display()
        );
        Ok(())
    }

    /// Register a document vector. Re-adding an id replaces its vector.
    pub fn add(&mut self, id: &str, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(Error::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }

        if let Some(&key) = self.id_to_key.get(id) {
            self.index
                .remove(key)
                .map_err(|e| Error::Index(format!("failed to replace vector: {e}")))?;
            self.key_to_id.remove(&key);
            self.id_to_key.remove(id);
        }

        if self.index.size() >= self.index.capacity() {
            let grown = (self.index.capacity() * 2).max(64);
            self.index
                .reserve(grown)
                .map_err(|e| Error::Index(format!("failed to grow capacity: {e}")))?;
        }

        let key = self.next_key;
        self.next_key += 1;
        self.index
            .add(key, vector)
            .map_err(|e| Error::Index(format!("failed to add vector: {e}")))?;
        self.id_to_key.insert(id.to_string(), key);
        self.key_to_id.insert(key, id.to_string());
        debug!("indexed '{}' as key {}", id, key);
        Ok(())
    }

    /// Nearest documents to the query vector.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<DocumentMatch>> {
        if query.len() != self.dimensions {
            return Err(Error::DimensionMismatch {
                expected: self.dimensions,
                actual: query.len(),
            });
        }

        let results = self
            .index
            .search(query, top_k)
            .map_err(|e| Error::Search(format!("query failed: {e}")))?;

        Ok(results
            .keys
            .iter()
            .zip(results.distances.iter())
            .filter_map(|(key, distance)| {
                self.key_to_id.get(key).map(|id| DocumentMatch {
                    id: id.clone(),
                    score: 1.0 - distance,
                })
            })
            .collect())
    }

    /// Number of indexed documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.id_to_key.len()
    }

    /// Whether the index holds no documents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.id_to_key.is_empty()
    }
}
