//! C7 Reranker Client (spec §4.7).
//!
//! A keyword-overlap fallback scorer handles the case where no
//! cross-encoder endpoint is configured; the `RerankProvider` trait keeps
//! that fallback and an HTTP-backed cross-encoder call interchangeable.
//! This is a single blocking scored rerank call behind a hard timeout, not
//! a cascaded early-exit/layer-level strategy.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use pipeline_core::Document;

#[derive(Error, Debug)]
pub enum RerankError {
    #[error("rerank request failed: {0}")]
    Request(String),
    #[error("rerank timed out")]
    Timeout,
}

/// A document after scoring by the reranker, score in `[0, 1]`.
#[derive(Debug, Clone)]
pub struct RerankedDoc {
    pub document: Document,
    pub score: f32,
}

/// Pluggable cross-encoder backend. No vendor SDK in the corpus exposes a
/// generic rerank contract, so this models the HTTP shape of spec §6.4
/// directly: `(query, [(id, clipped_text)]) -> scores in original order`.
#[async_trait]
pub trait RerankProvider: Send + Sync {
    async fn score(&self, query: &str, docs: &[(String, String)]) -> Result<Vec<f32>, RerankError>;
}

const MAX_CHARS: usize = 1500;

/// Keyword-overlap fallback scorer, used when no cross-encoder endpoint is
/// configured. Grounded on the teacher's `SimpleScorer`.
pub struct KeywordOverlapProvider;

#[async_trait]
impl RerankProvider for KeywordOverlapProvider {
    async fn score(&self, query: &str, docs: &[(String, String)]) -> Result<Vec<f32>, RerankError> {
        let query_words: std::collections::HashSet<&str> = query.split_whitespace().collect();
        Ok(docs
            .iter()
            .map(|(_, text)| {
                let doc_words: std::collections::HashSet<&str> = text.split_whitespace().collect();
                let overlap = query_words.intersection(&doc_words).count();
                let union = query_words.union(&doc_words).count();
                if union > 0 {
                    overlap as f32 / union as f32
                } else {
                    0.0
                }
            })
            .collect())
    }
}

/// HTTP cross-encoder rerank provider (spec §6.4), modeled directly on
/// `original_source/src/models/rerank.py`'s Cohere `rerank-english-v3.0`
/// call: `(query, documents[text], top_n) -> [{index, relevance_score}]`.
/// No rerank-vendor SDK appears anywhere in the example pack, so this
/// speaks the generic HTTP shape the spec itself describes rather than a
/// specific vendor's request/response format.
pub struct HttpRerankProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpRerankProvider {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self { client: reqwest::Client::new(), endpoint: endpoint.into(), api_key }
    }
}

#[derive(Serialize)]
struct RerankRequestBody<'a> {
    query: &'a str,
    documents: &'a [String],
    top_n: usize,
}

#[derive(Deserialize)]
struct RerankResponseBody {
    results: Vec<RerankResultItem>,
}

#[derive(Deserialize)]
struct RerankResultItem {
    index: usize,
    relevance_score: f32,
}

#[async_trait]
impl RerankProvider for HttpRerankProvider {
    async fn score(&self, query: &str, docs: &[(String, String)]) -> Result<Vec<f32>, RerankError> {
        let texts: Vec<String> = docs.iter().map(|(_, text)| text.clone()).collect();
        let body = RerankRequestBody { query, documents: &texts, top_n: texts.len() };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let start = std::time::Instant::now();
        let response = request.send().await.map_err(|e| RerankError::Request(e.to_string()))?;
        let parsed: RerankResponseBody = response
            .json()
            .await
            .map_err(|e| RerankError::Request(e.to_string()))?;

        let mut scores = vec![0.0_f32; texts.len()];
        for item in parsed.results {
            if let Some(slot) = scores.get_mut(item.index) {
                *slot = item.relevance_score;
            }
        }

        tracing::debug!(dep = "reranker", op = "rerank", status = "OK", ms = start.elapsed().as_millis());
        Ok(scores)
    }
}

/// Reranks candidate documents behind a hard wall-clock timeout, clipping
/// payload text and falling back to upstream order on any failure.
pub struct RerankerClient {
    provider: Box<dyn RerankProvider>,
    timeout: Duration,
}

impl RerankerClient {
    pub fn new(provider: Box<dyn RerankProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Scores `docs` against `query` and returns the top `top_n`, ordered by
    /// relevance descending. On timeout or provider error, logs
    /// `status=FALLBACK` and returns the input, truncated to `top_n`,
    /// in its original order (spec §4.7).
    pub async fn rerank(&self, query: &str, docs: Vec<Document>, top_n: usize) -> Vec<RerankedDoc> {
        let payload: Vec<(String, String)> = docs
            .iter()
            .map(|d| (d.id.clone(), clip(&d.content, MAX_CHARS)))
            .collect();

        let result = tokio::time::timeout(self.timeout, self.provider.score(query, &payload)).await;

        match result {
            Ok(Ok(scores)) if scores.len() == docs.len() => {
                let mut scored: Vec<RerankedDoc> = docs
                    .into_iter()
                    .zip(scores)
                    .map(|(document, score)| RerankedDoc { document, score })
                    .collect();
                scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
                scored.truncate(top_n);
                scored
            }
            Ok(Ok(_)) => {
                tracing::warn!(dep = "reranker", status = "FALLBACK", reason = "score count mismatch");
                fallback(docs, top_n)
            }
            Ok(Err(err)) => {
                tracing::warn!(dep = "reranker", status = "FALLBACK", error = %err);
                fallback(docs, top_n)
            }
            Err(_) => {
                tracing::warn!(dep = "reranker", status = "FALLBACK", error = "timeout");
                fallback(docs, top_n)
            }
        }
    }
}

fn fallback(docs: Vec<Document>, top_n: usize) -> Vec<RerankedDoc> {
    docs.into_iter()
        .take(top_n)
        .map(|document| RerankedDoc { score: document.score, document })
        .collect()
}

fn clip(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowProvider;
    #[async_trait]
    impl RerankProvider for SlowProvider {
        async fn score(&self, _query: &str, docs: &[(String, String)]) -> Result<Vec<f32>, RerankError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(docs.iter().map(|_| 1.0).collect())
        }
    }

    struct FailingProvider;
    #[async_trait]
    impl RerankProvider for FailingProvider {
        async fn score(&self, _query: &str, _docs: &[(String, String)]) -> Result<Vec<f32>, RerankError> {
            Err(RerankError::Request("boom".to_string()))
        }
    }

    #[tokio::test]
    async fn ranks_by_keyword_overlap() {
        let client = RerankerClient::new(Box::new(KeywordOverlapProvider), Duration::from_secs(5));
        let docs = vec![
            Document::new("1", "Green Roofs", "unrelated content here", 0.5),
            Document::new("2", "Heat Safety", "heat wave safety tips for home", 0.5),
        ];
        let ranked = client.rerank("heat wave safety tips", docs, 2).await;
        assert_eq!(ranked[0].document.id, "2");
    }

    #[tokio::test]
    async fn timeout_preserves_upstream_order() {
        let client = RerankerClient::new(Box::new(SlowProvider), Duration::from_millis(20));
        let docs = vec![
            Document::new("1", "A", "a", 0.9),
            Document::new("2", "B", "b", 0.7),
            Document::new("3", "C", "c", 0.5),
        ];
        let ranked = client.rerank("q", docs, 2).await;
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].document.id, "1");
        assert_eq!(ranked[1].document.id, "2");
    }

    #[tokio::test]
    async fn provider_error_falls_back_to_truncated_upstream_order() {
        let client = RerankerClient::new(Box::new(FailingProvider), Duration::from_secs(5));
        let docs = vec![Document::new("1", "A", "a", 0.9), Document::new("2", "B", "b", 0.7)];
        let ranked = client.rerank("q", docs, 1).await;
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].document.id, "1");
    }

    #[test]
    fn clips_to_max_chars() {
        let long = "x".repeat(2000);
        assert_eq!(clip(&long, MAX_CHARS).chars().count(), MAX_CHARS);
    }
}
