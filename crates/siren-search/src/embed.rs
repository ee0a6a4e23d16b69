//! Text embedding for the document index

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};
use tract_onnx::prelude::*;

const DEFAULT_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
const DEFAULT_DIMENSIONS: usize = 384;
const DEFAULT_MAX_TOKENS: usize = 256;

/// Converts text into dense vectors for similarity search.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts. The default walks them one by one.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Output vector length.
    fn dimensions(&self) -> usize;
}

type EmbedPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Sentence-transformer embedder running on the tract ONNX runtime.
///
/// Downloads all-MiniLM-L6-v2 (384 dimensions) from HuggingFace on first
/// use and runs fully offline afterwards.
pub struct MiniLmEmbedder {
    plan: Arc<EmbedPlan>,
    tokenizer: Arc<tokenizers::Tokenizer>,
    max_tokens: usize,
}

impl MiniLmEmbedder {
    /// Fetch (if needed) and load the default model.
    pub fn new() -> Result<Self> {
        info!("Loading embedding model {}", DEFAULT_MODEL);

        let api = hf_hub::api::sync::Api::new()
            .map_err(|e| Error::Embedding(format!("hub api unavailable: {e}")))?;
        let repo = api.model(DEFAULT_MODEL.to_string());

        let model_path = repo
            .get("model.onnx")
            .or_else(|_| repo.get("onnx/model.onnx"))
            .map_err(|e| Error::Embedding(format!("model download failed: {e}")))?;
        let tokenizer_path = repo
            .get("tokenizer.json")
            .map_err(|e| Error::Embedding(format!("tokenizer download failed: {e}")))?;

        let plan = tract_onnx::onnx()
            .model_for_path(&model_path)
            .map_err(|e| Error::Embedding(format!("model load failed: {e}")))?
            .into_optimized()
            .map_err(|e| Error::Embedding(format!("model optimize failed: {e}")))?
            .into_runnable()
            .map_err(|e| Error::Embedding(format!("model not runnable: {e}")))?;

        let tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| Error::Embedding(format!("tokenizer load failed: {e}")))?;

        info!(
            "Embedding model ready ({} dimensions)",
            DEFAULT_DIMENSIONS
        );

        Ok(Self {
            plan: Arc::new(plan),
            tokenizer: Arc::new(tokenizer),
            max_tokens: DEFAULT_MAX_TOKENS,
        })
    }

    fn encode(&self, text: &str) -> Result<(Tensor, Tensor, Tensor, Vec<i64>)> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| Error::Embedding(format!("tokenization failed: {e}")))?;

        let take = encoding.get_ids().len().min(self.max_tokens);
        let ids: Vec<i64> = encoding.get_ids()[..take].iter().map(|&x| i64::from(x)).collect();
        let mask: Vec<i64> = encoding.get_attention_mask()[..take]
            .iter()
            .map(|&x| i64::from(x))
            .collect();
        let types: Vec<i64> = encoding.get_type_ids()[..take]
            .iter()
            .map(|&x| i64::from(x))
            .collect();

        let to_tensor = |values: Vec<i64>| -> Result<Tensor> {
            Ok(tract_ndarray::Array2::from_shape_vec((1, take), values)
                .map_err(|e| Error::Embedding(format!("tensor shape error: {e}")))?
                .into())
        };

        Ok((
            to_tensor(ids)?,
            to_tensor(mask.clone())?,
            to_tensor(types)?,
            mask,
        ))
    }
}

#[async_trait]
impl EmbeddingProvider for MiniLmEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let (ids, mask_tensor, types, mask) = self.encode(text)?;

        let outputs = self
            .plan
            .run(tvec![ids.into(), mask_tensor.into(), types.into()])
            .map_err(|e| Error::Embedding(format!("inference failed: {e}")))?;

        // First output: token embeddings [1, seq_len, hidden]. Mean-pool
        // the attended tokens, then L2-normalize.
        let token_embeddings = outputs[0]
            .to_array_view::<f32>()
            .map_err(|e| Error::Embedding(format!("output read failed: {e}")))?;
        let hidden = token_embeddings.shape()[2];

        let mut pooled = vec![0.0f32; hidden];
        let mut attended = 0.0f32;
        for (i, &m) in mask.iter().enumerate() {
            if m == 0 {
                continue;
            }
            attended += 1.0;
            for (j, value) in pooled.iter_mut().enumerate() {
                *value += token_embeddings[[0, i, j]];
            }
        }
        if attended > 0.0 {
            for value in &mut pooled {
                *value /= attended;
            }
        }

        let norm = pooled.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut pooled {
                *value /= norm;
            }
        }

        debug!("embedded {} chars into {} dims", text.len(), pooled.len());
        Ok(pooled)
    }

    fn dimensions(&self) -> usize {
        DEFAULT_DIMENSIONS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UnitEmbedder;

    #[async_trait]
    impl EmbeddingProvider for UnitEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(vec![text.len() as f32, 1.0])
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    #[tokio::test]
    async fn batch_default_walks_every_text() {
        let embedder = UnitEmbedder;
        let texts = vec!["a".to_string(), "bbb".to_string()];
        let vectors = embedder.embed_batch(&texts).await.unwrap();
        assert_eq!(vectors, vec![vec![1.0, 1.0], vec![3.0, 1.0]]);
    }

    #[tokio::test]
    #[ignore = "downloads the MiniLM model"]
    async fn minilm_embeds_to_unit_length() {
        let embedder = MiniLmEmbedder::new().unwrap();
        let v = embedder.embed("hello world").await.unwrap();
        assert_eq!(v.len(), embedder.dimensions());
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-3);
    }
}
