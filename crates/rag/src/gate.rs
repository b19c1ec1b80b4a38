//! C5 Similarity Gate + Refill (spec §4.5).
//!
//! No direct teacher counterpart; grounded in the general
//! "compute a percentile, branch on an adaptive margin, re-query on
//! shortfall" shape used by the teacher's own fallback-on-zero-matches
//! idiom (`rag/src/retriever.rs`). The refill re-query itself is not
//! performed here: it needs a live `Retriever` handle and the original
//! dense/sparse query vectors, both owned by the Orchestrator (spec §5:
//! "Ordering guarantees ... retrieval before rerank"), so this module
//! only computes the gate and exposes the inputs a refill decision needs.

use pipeline_config::RetrievalConfig;
use pipeline_core::Document;

/// Diagnostics from one gate pass.
#[derive(Debug, Clone, Default)]
pub struct GateReport {
    pub max_sim: f32,
    pub p50: f32,
    pub p95: f32,
    pub delta: f32,
    pub threshold_used: f32,
    pub kept_before_cap: usize,
    pub kept: usize,
    /// True if `kept < min_kept`; the Orchestrator should trigger a refill.
    pub needs_refill: bool,
}

/// Applies the adaptive similarity gate of spec §4.5 to `docs`, which must
/// carry `pinecone_score` as the similarity used for gating.
pub struct SimilarityGate<'a> {
    config: &'a RetrievalConfig,
}

impl<'a> SimilarityGate<'a> {
    pub fn new(config: &'a RetrievalConfig) -> Self {
        Self { config }
    }

    /// Returns the kept documents (original relative order preserved) and
    /// a diagnostics report. `k` is the configured FinalSet size, used to
    /// compute the `max(K, 10)` cap.
    pub fn apply(&self, docs: Vec<Document>, k: usize) -> (Vec<Document>, GateReport) {
        if docs.is_empty() {
            return (docs, GateReport::default());
        }

        let mut sims: Vec<f32> = docs.iter().map(|d| d.pinecone_score).collect();
        sims.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));

        let max_sim = sims[0];
        let p50 = percentile(&sims, 0.50);
        let p95 = percentile(&sims, 0.95);

        let margin = &self.config.adaptive_margin;
        let delta = if margin.enabled {
            (0.5 * (p95 - p50)).clamp(margin.min, margin.max)
        } else {
            margin.min
        };

        let threshold_used = if max_sim < self.config.similarity_base {
            max_sim - delta
        } else {
            self.config.similarity_base.max(max_sim - delta)
        };

        let cap = k.max(10);

        let mut kept: Vec<Document> = docs
            .into_iter()
            .filter(|d| d.pinecone_score >= threshold_used)
            .collect();
        let kept_before_cap = kept.len();
        kept.truncate(cap);

        let needs_refill = kept.len() < self.config.min_kept && self.config.refill_enabled;

        let report = GateReport {
            max_sim,
            p50,
            p95,
            delta,
            threshold_used,
            kept_before_cap,
            kept: kept.len(),
            needs_refill,
        };

        (kept, report)
    }

    /// Spec §4.5's refill path: "union with original pool, re-dedup,
    /// filter by `fallback_threshold`, backfill ignoring threshold to
    /// reach `max_docs_before_rerank`." `base` and `refilled` are already
    /// deduped individually; this dedups their union by id, applies
    /// `similarity_fallback`, then backfills from the highest-similarity
    /// remaining documents (regardless of threshold) up to `cap`.
    pub fn refill_merge(&self, base: Vec<Document>, refilled: Vec<Document>, cap: usize) -> Vec<Document> {
        let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();
        let mut union: Vec<Document> = Vec::with_capacity(base.len() + refilled.len());
        for doc in base.into_iter().chain(refilled.into_iter()) {
            if seen.insert(doc.id.clone()) {
                union.push(doc);
            }
        }
        union.sort_by(|a, b| b.pinecone_score.partial_cmp(&a.pinecone_score).unwrap_or(std::cmp::Ordering::Equal));

        let mut kept: Vec<Document> = union
            .iter()
            .filter(|d| d.pinecone_score >= self.config.similarity_fallback)
            .cloned()
            .collect();
        kept.truncate(cap);

        if kept.len() < cap {
            let present: std::collections::HashSet<String> = kept.iter().map(|d| d.id.clone()).collect();
            for doc in &union {
                if kept.len() >= cap {
                    break;
                }
                if !present.contains(&doc.id) {
                    kept.push(doc.clone());
                }
            }
        }

        kept
    }

    /// Spec §4.5: "For how-to queries, if pool is short, top up with
    /// highest-similarity documents regardless of gate." `gated` is the
    /// gate's output; `pool` is the full pre-gate candidate pool sorted by
    /// similarity descending. Tops up `gated` to `target_len` by pulling
    /// the highest-similarity documents from `pool` not already present.
    pub fn howto_top_up(&self, mut gated: Vec<Document>, pool: &[Document], target_len: usize) -> Vec<Document> {
        if gated.len() >= target_len {
            return gated;
        }

        let present: std::collections::HashSet<String> = gated.iter().map(|d| d.id.clone()).collect();
        let mut candidates: Vec<&Document> = pool.iter().filter(|d| !present.contains(&d.id)).collect();
        candidates.sort_by(|a, b| b.pinecone_score.partial_cmp(&a.pinecone_score).unwrap_or(std::cmp::Ordering::Equal));

        for doc in candidates {
            if gated.len() >= target_len {
                break;
            }
            gated.push(doc.clone());
        }

        gated
    }
}

/// Nearest-rank percentile over a slice already sorted descending.
fn percentile(sorted_desc: &[f32], p: f32) -> f32 {
    if sorted_desc.is_empty() {
        return 0.0;
    }
    // Sorted descending; the p-th percentile from the bottom is the
    // (1-p)-th from the top.
    let rank = ((1.0 - p) * (sorted_desc.len() as f32 - 1.0)).round() as usize;
    sorted_desc[rank.min(sorted_desc.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, sim: f32) -> Document {
        let mut d = Document::new(id, id, "content", sim);
        d.pinecone_score = sim;
        d
    }

    #[test]
    fn keeps_near_max_when_below_base_threshold() {
        let config = RetrievalConfig::default();
        let gate = SimilarityGate::new(&config);
        let docs = vec![doc("a", 0.60), doc("b", 0.58), doc("c", 0.30)];
        let (kept, report) = gate.apply(docs, 5);
        assert!(report.max_sim < config.similarity_base);
        assert!(kept.iter().any(|d| d.id == "a"));
        assert!(kept.iter().any(|d| d.id == "b"));
        assert!(!kept.iter().any(|d| d.id == "c"));
    }

    #[test]
    fn monotone_in_base_threshold() {
        // Testable property #5: increasing base_threshold never increases |kept|.
        let docs = vec![doc("a", 0.9), doc("b", 0.8), doc("c", 0.75), doc("d", 0.5)];

        let mut low = RetrievalConfig::default();
        low.similarity_base = 0.5;
        let mut high = RetrievalConfig::default();
        high.similarity_base = 0.85;

        let (kept_low, _) = SimilarityGate::new(&low).apply(docs.clone(), 5);
        let (kept_high, _) = SimilarityGate::new(&high).apply(docs, 5);

        assert!(kept_high.len() <= kept_low.len());
    }

    #[test]
    fn flags_refill_when_under_min_kept() {
        let config = RetrievalConfig::default();
        let gate = SimilarityGate::new(&config);
        let docs = vec![doc("a", 0.95)];
        let (kept, report) = gate.apply(docs, 5);
        assert_eq!(kept.len(), 1);
        assert!(report.needs_refill);
    }

    #[test]
    fn refill_merge_filters_by_fallback_threshold_then_backfills() {
        let config = RetrievalConfig::default();
        let gate = SimilarityGate::new(&config);
        let base = vec![doc("a", 0.95)];
        let refilled = vec![
            doc("b", 0.50), // above similarity_fallback (0.45 default)
            doc("c", 0.20), // below it, only reachable via backfill
        ];
        let merged = gate.refill_merge(base, refilled, 3);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].id, "a");
        assert_eq!(merged[1].id, "b");
        assert_eq!(merged[2].id, "c");
    }

    #[test]
    fn refill_merge_dedups_by_id() {
        let config = RetrievalConfig::default();
        let gate = SimilarityGate::new(&config);
        let base = vec![doc("a", 0.95)];
        let refilled = vec![doc("a", 0.40), doc("b", 0.80)];
        let merged = gate.refill_merge(base, refilled, 5);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn howto_top_up_fills_from_pool() {
        let config = RetrievalConfig::default();
        let gate = SimilarityGate::new(&config);
        let gated = vec![doc("a", 0.95)];
        let pool = vec![doc("a", 0.95), doc("b", 0.40), doc("c", 0.35)];
        let topped = gate.howto_top_up(gated, &pool, 3);
        assert_eq!(topped.len(), 3);
        assert_eq!(topped[1].id, "b");
    }
}
