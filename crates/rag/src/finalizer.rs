//! C8 Finalizer (spec §4.8).
//!
//! No direct teacher counterpart; reuses the percentile/threshold-softening
//! shape of [`crate::gate`]'s `SimilarityGate` (itself grounded in the
//! teacher's retry-on-shortfall idiom) applied to rerank scores instead of
//! retrieval similarities. The second-pass guaranteed-K widened refill
//! needs a live `Retriever`/`RerankerClient` pair and is left to the
//! Orchestrator, same division of responsibility as the gate's refill.

use pipeline_core::Document;

use crate::reranker::RerankedDoc;

const MIN_RERANK: f32 = 0.60;
const MIN_ABOVE: usize = 3;

/// Diagnostics from one finalize pass, per spec §4.8.
#[derive(Debug, Clone, Default)]
pub struct FinalizeReport {
    pub floor_used: f32,
    pub above_floor: usize,
    pub backfilled: usize,
    /// Count of documents dropped solely because they ranked below the top-2
    /// rerank slots and did not survive the floor/quota (diagnostic only).
    pub dropped_top2: usize,
    /// True when `final.len() < k` even after backfill; Orchestrator should
    /// run the second-pass guaranteed-K widened refill.
    pub needs_second_pass: bool,
}

pub struct Finalizer {
    k: usize,
}

impl Finalizer {
    pub fn new(k: usize) -> Self {
        Self { k }
    }

    /// Applies the floor/quota/backfill steps of spec §4.8 to `ranked`,
    /// which must already be sorted by rerank score descending.
    pub fn finalize(&self, ranked: Vec<RerankedDoc>) -> (Vec<Document>, FinalizeReport) {
        if ranked.is_empty() {
            return (Vec::new(), FinalizeReport { needs_second_pass: self.k > 0, ..Default::default() });
        }

        let scores: Vec<f32> = ranked.iter().map(|r| r.score).collect();
        let mut sorted_desc = scores.clone();
        sorted_desc.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));

        let p20 = percentile(&sorted_desc, 0.20);
        let mut floor = (MIN_RERANK.max(p20)).min(0.95);

        let mut above_floor = scores.iter().filter(|&&s| s >= floor).count();
        if above_floor < MIN_ABOVE {
            let p10 = percentile(&sorted_desc, 0.10);
            floor = floor.min(MIN_RERANK.max(p10));
            above_floor = scores.iter().filter(|&&s| s >= floor).count();
        }

        let top2_dropped = ranked.iter().take(2).filter(|r| r.score < floor).count();

        let mut keepers: Vec<RerankedDoc> = ranked.iter().filter(|r| r.score >= floor).cloned().collect();
        keepers.truncate(self.k);

        let mut backfilled = 0;
        if keepers.len() < self.k {
            let kept_ids: std::collections::HashSet<String> =
                keepers.iter().map(|r| r.document.id.clone()).collect();
            for r in &ranked {
                if keepers.len() >= self.k {
                    break;
                }
                if !kept_ids.contains(&r.document.id) {
                    keepers.push(r.clone());
                    backfilled += 1;
                }
            }
        }

        let needs_second_pass = keepers.len() < self.k;

        let report = FinalizeReport {
            floor_used: floor,
            above_floor,
            backfilled,
            dropped_top2: top2_dropped,
            needs_second_pass,
        };

        (keepers.into_iter().map(|r| r.document).collect(), report)
    }
}

fn percentile(sorted_desc: &[f32], p: f32) -> f32 {
    if sorted_desc.is_empty() {
        return 0.0;
    }
    let rank = ((1.0 - p) * (sorted_desc.len() as f32 - 1.0)).round() as usize;
    sorted_desc[rank.min(sorted_desc.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranked(id: &str, score: f32) -> RerankedDoc {
        RerankedDoc { document: Document::new(id, id, "content", score), score }
    }

    #[test]
    fn keeps_docs_above_hard_floor() {
        let finalizer = Finalizer::new(3);
        let docs = vec![ranked("a", 0.95), ranked("b", 0.90), ranked("c", 0.85), ranked("d", 0.20)];
        let (kept, report) = finalizer.finalize(docs);
        assert_eq!(kept.len(), 3);
        assert!(!kept.iter().any(|d| d.id == "d"));
        assert!(report.floor_used >= MIN_RERANK);
    }

    #[test]
    fn softens_floor_when_too_few_above_it() {
        let finalizer = Finalizer::new(3);
        let docs = vec![ranked("a", 0.65), ranked("b", 0.30), ranked("c", 0.25), ranked("d", 0.20)];
        let (kept, report) = finalizer.finalize(docs);
        assert!(kept.len() >= 1);
        assert!(report.floor_used <= 0.65);
    }

    #[test]
    fn backfills_to_exactly_k_when_short() {
        let finalizer = Finalizer::new(3);
        let docs = vec![ranked("a", 0.95), ranked("b", 0.10)];
        let (kept, report) = finalizer.finalize(docs);
        assert_eq!(kept.len(), 2);
        assert!(report.needs_second_pass);
    }

    #[test]
    fn flags_second_pass_when_pool_too_small() {
        let finalizer = Finalizer::new(5);
        let docs = vec![ranked("a", 0.95)];
        let (_, report) = finalizer.finalize(docs);
        assert!(report.needs_second_pass);
    }
}
