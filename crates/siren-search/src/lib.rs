//! Siren Search - Local document search
//!
//! Vector index over local documents, built by the `--index` subtool and
//! queried by the file-search handler. Embeddings come from a small
//! sentence-transformer running locally; nothing leaves the machine.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod embed;
pub mod error;
pub mod index;
pub mod indexer;

pub use embed::{EmbeddingProvider, MiniLmEmbedder};
pub use error::{Error, Result};
pub use index::{DocumentIndex, DocumentMatch};
pub use indexer::DocumentIndexer;
