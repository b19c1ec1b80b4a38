//! C6 MMR Diversifier (spec §4.6).
//!
//! No direct teacher counterpart (the teacher's reranker does early-exit
//! cross-encoder rerank, not MMR); authored fresh per spec §4.6, reusing
//! the cosine-similarity helper pattern visible in the teacher's
//! `rag/src/reranker.rs` `SimpleScorer`/cosine test. Vector sourcing
//! follows spec §9: prefer index-returned `Document::values`, fall back to
//! the embedding cache, only then re-embed (single batch).

use std::sync::Arc;

use pipeline_core::Document;

use crate::embedding_cache::EmbeddingCache;

/// Counts of where each candidate's dense vector came from, for the
/// `used_index`/`used_cache`/`embedded` metric of spec §4.6.
#[derive(Debug, Clone, Default)]
pub struct MmrReport {
    pub used_index: usize,
    pub used_cache: usize,
    pub embedded: usize,
    pub selected: usize,
}

pub struct MmrDiversifier {
    lambda: f32,
    overfetch: usize,
    cache: Option<Arc<EmbeddingCache>>,
}

impl MmrDiversifier {
    pub fn new(lambda: f32, overfetch: usize, cache: Option<Arc<EmbeddingCache>>) -> Self {
        Self { lambda: lambda.clamp(0.0, 1.0), overfetch, cache }
    }

    /// Selects a diverse top-`target` subset of `pool` relative to `query`,
    /// embedding any document lacking a dense vector via `embed_missing`
    /// (expected to encode all missing texts in a single batch, per spec
    /// §9's "encode in one batch to minimize model invocations").
    ///
    /// `embed_missing` receives the texts needing encoding and returns
    /// vectors in the same order.
    pub fn select(
        &self,
        query: &[f32],
        pool: Vec<Document>,
        target: usize,
        embed_missing: impl FnOnce(&[&str]) -> Vec<Vec<f32>>,
    ) -> (Vec<Document>, MmrReport) {
        let mut report = MmrReport::default();
        let mut pool: Vec<Document> = pool.into_iter().take(self.overfetch).collect();

        let mut missing_idx = Vec::new();
        let mut missing_texts = Vec::new();
        let mut vectors: Vec<Option<Vec<f32>>> = Vec::with_capacity(pool.len());

        for (i, doc) in pool.iter().enumerate() {
            if let Some(v) = &doc.values {
                vectors.push(Some(v.clone()));
                report.used_index += 1;
            } else if let Some(cached) = self.cache.as_ref().and_then(|c| c.get(&EmbeddingCache::key_for(&doc.id, &doc.content))) {
                vectors.push(Some(cached));
                report.used_cache += 1;
            } else {
                vectors.push(None);
                missing_idx.push(i);
                missing_texts.push(doc.content.as_str());
            }
        }

        if !missing_texts.is_empty() {
            let embedded = embed_missing(&missing_texts);
            for (slot, vec) in missing_idx.into_iter().zip(embedded.into_iter()) {
                if let Some(cache) = &self.cache {
                    cache.put(EmbeddingCache::key_for(&pool[slot].id, &pool[slot].content), vec.clone());
                }
                vectors[slot] = Some(vec);
                report.embedded += 1;
            }
        }

        let n = pool.len();
        let mut remaining: Vec<usize> = (0..n).collect();
        let mut selected: Vec<usize> = Vec::new();

        let relevance: Vec<f32> = (0..n)
            .map(|i| vectors[i].as_ref().map(|v| cosine(query, v)).unwrap_or(0.0))
            .collect();

        while !remaining.is_empty() && selected.len() < target {
            let (best_pos, _) = remaining
                .iter()
                .enumerate()
                .map(|(pos, &i)| {
                    let score = if selected.is_empty() {
                        relevance[i]
                    } else {
                        let max_sim_to_selected = selected
                            .iter()
                            .map(|&j| match (&vectors[i], &vectors[j]) {
                                (Some(a), Some(b)) => cosine(a, b),
                                _ => 0.0,
                            })
                            .fold(f32::MIN, f32::max);
                        self.lambda * relevance[i] - (1.0 - self.lambda) * max_sim_to_selected
                    };
                    (pos, score)
                })
                .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
                .expect("remaining is non-empty");

            selected.push(remaining.remove(best_pos));
        }

        report.selected = selected.len();

        // Swap-remove in descending index order to pull chosen documents
        // out of `pool` without disturbing the indices of the rest.
        let mut selected_sorted = selected.clone();
        selected_sorted.sort_unstable();
        let mut result: Vec<Option<Document>> = pool.drain(..).map(Some).collect();
        let chosen: Vec<Document> = selected
            .iter()
            .map(|&i| result[i].take().expect("each index selected at most once"))
            .collect();

        (chosen, report)
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let dot: f32 = a[..n].iter().zip(&b[..n]).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a[..n].iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b[..n].iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_with_values(id: &str, values: Vec<f32>) -> Document {
        let mut d = Document::new(id, id, "content", 0.5);
        d.values = Some(values);
        d
    }

    #[test]
    fn never_selects_same_document_twice() {
        let mmr = MmrDiversifier::new(0.3, 12, None);
        let pool = vec![
            doc_with_values("a", vec![1.0, 0.0]),
            doc_with_values("b", vec![0.9, 0.1]),
            doc_with_values("c", vec![0.0, 1.0]),
        ];
        let (selected, report) = mmr.select(&[1.0, 0.0], pool, 5, |_| vec![]);
        let ids: std::collections::HashSet<_> = selected.iter().map(|d| d.id.clone()).collect();
        assert_eq!(ids.len(), selected.len());
        assert!(selected.len() <= 3);
        assert_eq!(report.used_index, 3);
    }

    #[test]
    fn prefers_relevance_first_then_diversity() {
        let mmr = MmrDiversifier::new(0.3, 12, None);
        let pool = vec![
            doc_with_values("most_relevant", vec![1.0, 0.0]),
            doc_with_values("near_duplicate", vec![0.99, 0.01]),
            doc_with_values("diverse", vec![0.0, 1.0]),
        ];
        let (selected, _) = mmr.select(&[1.0, 0.0], pool, 1, |_| vec![]);
        assert_eq!(selected[0].id, "most_relevant");
    }

    #[test]
    fn embeds_missing_vectors_in_one_batch() {
        let mmr = MmrDiversifier::new(0.3, 12, None);
        let pool = vec![Document::new("a", "a", "content a", 0.5), Document::new("b", "b", "content b", 0.5)];
        let mut batch_calls = 0;
        let (selected, report) = mmr.select(
            &[1.0, 0.0],
            pool,
            2,
            |texts| {
                batch_calls += 1;
                assert_eq!(texts.len(), 2);
                texts.iter().map(|_| vec![1.0, 0.0]).collect()
            },
        );
        assert_eq!(batch_calls, 1);
        assert_eq!(selected.len(), 2);
        assert_eq!(report.embedded, 2);
    }
}
