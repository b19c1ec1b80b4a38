//! Hybrid retrieval, diversification and reranking for the climate
//! query pipeline (C1-C8).
//!
//! Components, leaves first:
//! - [`embedding_cache`] - C1 Embedding Cache: LRU of document dense vectors
//! - [`embedder`] - C2 Query Embedder: dense + sparse query vectors
//! - [`vector_index`] / [`retriever`] - C3 Hybrid Retriever
//! - [`filters`] / [`domain_boost`] - C4 Post-retrieval Filters
//! - [`gate`] - C5 Similarity Gate + Refill
//! - [`mmr`] - C6 MMR Diversifier
//! - [`reranker`] - C7 Reranker Client
//! - [`finalizer`] - C8 Finalizer

pub mod domain_boost;
pub mod embedder;
pub mod embedding_cache;
pub mod filters;
pub mod finalizer;
pub mod gate;
pub mod mmr;
pub mod reranker;
pub mod retriever;
pub mod vector_index;

pub use domain_boost::{is_howto_query, DomainBooster};
pub use embedder::{CandleEmbedder, EmbedderConfig, EmbeddingError, QueryEmbedding};
pub use embedding_cache::EmbeddingCache;
pub use filters::{AudienceFilterReport, PostRetrievalFilters};
pub use finalizer::{FinalizeReport, Finalizer};
pub use gate::{GateReport, SimilarityGate};
pub use mmr::{MmrDiversifier, MmrReport};
pub use reranker::{HttpRerankProvider, KeywordOverlapProvider, RerankProvider, RerankedDoc, RerankerClient};
pub use retriever::HybridRetriever;
pub use vector_index::{IndexError, IndexQuery, Match, QdrantIndex, VectorIndex};

use thiserror::Error;

/// RAG errors, converted into `pipeline_core::Error` at the crate boundary.
#[derive(Error, Debug)]
pub enum RagError {
    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("vector index error: {0}")]
    VectorIndex(String),

    #[error("rerank error: {0}")]
    Rerank(String),
}

impl From<RagError> for pipeline_core::Error {
    fn from(err: RagError) -> Self {
        pipeline_core::Error::Rag(err.to_string())
    }
}
