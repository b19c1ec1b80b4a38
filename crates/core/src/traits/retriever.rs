//! Retrieval traits for RAG
//!
//! Generalized from the teacher's `core/src/traits/retriever.rs`:
//! `Document` is widened to the richer entity of spec §3 (title, url list,
//! pinecone_score, section_title, keywords, optional dense values), and
//! `Retriever::retrieve` takes the pre-embedded dense/sparse query vectors
//! plus an alpha weight instead of a raw query string, since the caller
//! (the query embedder) has already produced both vectors before the
//! hybrid retriever runs. The agentic/prefetch surface has no counterpart
//! here and is dropped.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::collections::HashSet;

use crate::Result;

/// A sparse (BM25-like) vector: parallel index/value arrays.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

impl SparseVector {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Hybrid retrieval interface (C3).
///
/// Implementations query a vector index with alpha-weighted dense and
/// sparse vectors, applying a server-side metadata filter with fallback
/// to an unfiltered query if the index rejects the filter.
#[async_trait]
pub trait Retriever: Send + Sync + 'static {
    /// Retrieve candidate documents for a single query.
    ///
    /// # Arguments
    /// * `dense` - dense query embedding
    /// * `sparse` - sparse query vector, possibly empty (see §4.2 ambiguity retry)
    /// * `alpha` - dense/sparse mix weight in `[0, 1]`
    /// * `top_k` - number of documents to request from the index
    /// * `filter` - optional metadata filter, applied server-side with fallback
    async fn retrieve(
        &self,
        dense: &[f32],
        sparse: &SparseVector,
        alpha: f32,
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Document>>;

    /// Retriever name for logging.
    fn name(&self) -> &str;
}

/// Metadata filter applied server-side against the vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataFilter {
    pub field: String,
    pub op: FilterOp,
    pub value: serde_json::Value,
}

impl MetadataFilter {
    pub fn eq(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Equals,
            value: value.into(),
        }
    }

    pub fn contains(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Contains,
            value: serde_json::Value::String(value.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum FilterOp {
    Equals,
    NotEquals,
    Contains,
    GreaterThan,
    LessThan,
}

/// A retrieved or reranked document (spec §3).
///
/// Immutable after retrieval in spirit: boosting and reranking stages
/// rewrite `score` on a cloned copy rather than mutating the pool in
/// place, so each stage's output is independently inspectable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub url: Vec<String>,
    pub score: f32,
    #[serde(default)]
    pub pinecone_score: f32,
    #[serde(default)]
    pub section_title: String,
    #[serde(default)]
    pub keywords: HashSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<f32>>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, title: impl Into<String>, content: impl Into<String>, score: f32) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            url: Vec::new(),
            score,
            pinecone_score: score,
            section_title: String::new(),
            keywords: HashSet::new(),
            values: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url.push(url.into());
        self
    }

    pub fn with_section_title(mut self, section_title: impl Into<String>) -> Self {
        self.section_title = section_title.into();
        self
    }

    pub fn with_keywords(mut self, keywords: impl IntoIterator<Item = String>) -> Self {
        self.keywords.extend(keywords);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Dedup key for `CandidatePool`: `(lower(title), lower(first url))` (spec §3).
    pub fn dedup_key(&self) -> (String, String) {
        (
            self.title.to_lowercase(),
            self.url.first().map(|u| u.to_lowercase()).unwrap_or_default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_builder() {
        let doc = Document::new("doc-1", "Green Roofs", "Rexdale is piloting green roofs.", 0.82)
            .with_url("https://example.org/green-roofs")
            .with_section_title("Adaptation")
            .with_keywords(["green roof".to_string(), "heat island".to_string()]);

        assert_eq!(doc.id, "doc-1");
        assert_eq!(doc.url.len(), 1);
        assert!(doc.keywords.contains("heat island"));
    }

    #[test]
    fn dedup_key_is_lowercased() {
        let a = Document::new("a", "Green Roofs", "...", 0.5).with_url("https://Example.org/X");
        let b = Document::new("b", "green roofs", "...", 0.4).with_url("https://example.org/X");
        assert_eq!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn sparse_vector_empty() {
        let sparse = SparseVector::default();
        assert!(sparse.is_empty());
    }
}
