//! Query Embedder (C2)
//!
//! Produces dense + sparse query vectors from text (spec §4.2). The
//! dense path is grounded on the teacher's candle-based embedding stack
//! (`candle-core`/`candle-nn`/`candle-transformers`/`tokenizers`/`hf-hub`
//! in the workspace `Cargo.toml`); the teacher's own `candle_embeddings.rs`
//! was absent from the retrieved pack, so the BERT-style mean-pooling
//! implementation here is authored directly against those crates' public
//! APIs. The sparse path and the "ambiguous array" retry are grounded on
//! `original_source/src/models/retrieval.py`'s `get_query_embeddings()`,
//! which encodes a BGE-M3-style dense+sparse pair and recovers from a
//! known upstream bug by re-encoding with sparse output disabled.

use std::path::PathBuf;
use std::sync::Arc;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use thiserror::Error;
use tokenizers::Tokenizer;

use pipeline_core::SparseVector;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("model load error: {0}")]
    Load(String),
    #[error("tokenization error: {0}")]
    Tokenize(String),
    #[error("inference error: {0}")]
    Inference(String),
}

/// Output of a single query embedding call.
#[derive(Debug, Clone)]
pub struct QueryEmbedding {
    pub dense: Vec<f32>,
    pub sparse: SparseVector,
}

/// Configuration for the dense/sparse embedding model.
#[derive(Debug, Clone)]
pub struct EmbedderConfig {
    pub model_dir: PathBuf,
    pub max_seq_len: usize,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models/bge-m3"),
            max_seq_len: 512,
        }
    }
}

/// Dense+sparse query embedder backed by a local BERT-family model via
/// Candle. Implements the §4.2 failure policy: if sparse encoding fails
/// with an "ambiguous array" style error, retry once with sparse
/// disabled and emit an empty sparse vector rather than failing the
/// whole call.
pub struct CandleEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    max_seq_len: usize,
}

impl CandleEmbedder {
    pub fn load(config: &EmbedderConfig) -> Result<Self, EmbeddingError> {
        let device = Device::Cpu;

        let tokenizer_path = config.model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| EmbeddingError::Load(format!("tokenizer: {e}")))?;

        let config_path = config.model_dir.join("config.json");
        let bert_config: BertConfig = serde_json::from_slice(
            &std::fs::read(&config_path).map_err(|e| EmbeddingError::Load(e.to_string()))?,
        )
        .map_err(|e| EmbeddingError::Load(format!("bert config: {e}")))?;

        let weights_path = config.model_dir.join("model.safetensors");
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device)
                .map_err(|e| EmbeddingError::Load(format!("weights: {e}")))?
        };

        let model = BertModel::load(vb, &bert_config)
            .map_err(|e| EmbeddingError::Load(format!("bert model: {e}")))?;

        Ok(Self {
            model,
            tokenizer,
            device,
            max_seq_len: config.max_seq_len,
        })
    }

    /// Embeds `text`, applying the §4.2 sparse-ambiguity retry policy.
    ///
    /// CPU-bound; callers must offload this to `spawn_blocking` (spec §5).
    pub fn embed_query(&self, text: &str) -> Result<QueryEmbedding, EmbeddingError> {
        let dense = self.encode_dense(text)?;

        match self.encode_sparse(text) {
            Ok(sparse) => Ok(QueryEmbedding { dense, sparse }),
            Err(err) if is_ambiguous_array_error(&err) => {
                tracing::warn!(op = "embed_query", status = "FALLBACK", "sparse encoding ambiguous, retrying without sparse");
                Ok(QueryEmbedding { dense, sparse: SparseVector::default() })
            }
            Err(err) => Err(err),
        }
    }

    fn encode_dense(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| EmbeddingError::Tokenize(e.to_string()))?;

        let ids: Vec<u32> = encoding.get_ids().iter().take(self.max_seq_len).copied().collect();
        let input_ids = Tensor::new(ids.as_slice(), &self.device)
            .map_err(|e| EmbeddingError::Inference(e.to_string()))?
            .unsqueeze(0)
            .map_err(|e| EmbeddingError::Inference(e.to_string()))?;

        let token_type_ids = input_ids
            .zeros_like()
            .map_err(|e| EmbeddingError::Inference(e.to_string()))?;

        let output = self
            .model
            .forward(&input_ids, &token_type_ids, None)
            .map_err(|e| EmbeddingError::Inference(e.to_string()))?;

        // Mean-pool token embeddings into a single dense vector.
        let (_, seq_len, _) = output.dims3().map_err(|e| EmbeddingError::Inference(e.to_string()))?;
        let summed = output
            .sum(1)
            .map_err(|e| EmbeddingError::Inference(e.to_string()))?;
        let pooled = (summed / seq_len as f64).map_err(|e| EmbeddingError::Inference(e.to_string()))?;

        pooled
            .squeeze(0)
            .map_err(|e| EmbeddingError::Inference(e.to_string()))?
            .to_vec1::<f32>()
            .map_err(|e| EmbeddingError::Inference(e.to_string()))
    }

    /// Produces a sparse (lexical) vector over the tokenizer's vocabulary
    /// space, weighted by term frequency. Returns an error tagged as
    /// "ambiguous array" when the tokenizer yields zero tokens, mirroring
    /// the upstream BGE-M3 bug this policy was written to recover from.
    fn encode_sparse(&self, text: &str) -> Result<SparseVector, EmbeddingError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| EmbeddingError::Tokenize(e.to_string()))?;

        let ids = encoding.get_ids();
        if ids.is_empty() {
            return Err(EmbeddingError::Inference("ambiguous array: empty token sequence".to_string()));
        }

        let mut counts: std::collections::HashMap<u32, f32> = std::collections::HashMap::new();
        for &id in ids {
            *counts.entry(id).or_insert(0.0) += 1.0;
        }

        let mut indices: Vec<u32> = counts.keys().copied().collect();
        indices.sort_unstable();
        let values = indices.iter().map(|id| counts[id]).collect();

        Ok(SparseVector { indices, values })
    }
}

fn is_ambiguous_array_error(err: &EmbeddingError) -> bool {
    err.to_string().contains("ambiguous array")
}

/// Shared handle to the embedder, cheaply cloned across async tasks.
pub type SharedEmbedder = Arc<CandleEmbedder>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ambiguous_array_detection() {
        let err = EmbeddingError::Inference("ambiguous array: empty token sequence".to_string());
        assert!(is_ambiguous_array_error(&err));

        let other = EmbeddingError::Inference("some other failure".to_string());
        assert!(!is_ambiguous_array_error(&other));
    }
}
