//! C4 Post-retrieval Filters (spec §4.4).
//!
//! Runs the ordered transforms over a candidate document list: domain and
//! topic boosts (delegated to [`crate::domain_boost::DomainBooster`]),
//! the audience blocklist, and dedup. No direct teacher counterpart for
//! the blocklist/dedup step; grounded in the teacher's general pattern of
//! a config-driven regex set consulted per document
//! (`rag/src/domain_boost.rs`'s term dictionary), reused here for the
//! K-12/education exclusion list instead of term boosting.

use std::collections::HashSet;

use regex::Regex;

use pipeline_config::{BoostConfig, FilterConfig};
use pipeline_core::Document;

use crate::domain_boost::DomainBooster;

/// Diagnostics reported alongside the filtered document list, per spec §4.4
/// step 3 ("Report counts `{blocked, blocked_text_only}`").
#[derive(Debug, Clone, Default)]
pub struct AudienceFilterReport {
    /// Documents dropped because their title matched the blocklist.
    pub blocked: usize,
    /// Documents dropped because only their leading content (not title)
    /// matched the blocklist, or because their host matched a block domain.
    pub blocked_text_only: usize,
}

/// Runs the full C4 pipeline: domain/topic boosts, audience blocklist,
/// dedup by `(lower(title), lower(first url))`.
pub struct PostRetrievalFilters {
    booster: DomainBooster,
    blocklist: Vec<Regex>,
    block_domains: Vec<String>,
}

/// Hosts universally excluded regardless of configured blocklist regexes
/// (spec §4.4 step 3: "a small block-domain set").
const DEFAULT_BLOCK_DOMAINS: &[&str] = &["k12resources.example", "classroomguides.example"];

impl PostRetrievalFilters {
    pub fn new(filters: &FilterConfig, boosts: &BoostConfig) -> Self {
        let blocklist = filters
            .audience_blocklist_regex
            .iter()
            .filter_map(|pattern| Regex::new(pattern).ok())
            .collect();

        Self {
            booster: DomainBooster::new(boosts),
            blocklist,
            block_domains: DEFAULT_BLOCK_DOMAINS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Applies boosts, drops blocklisted documents, then dedups.
    ///
    /// Returns the surviving documents (boosted, deduped) and a count of
    /// how many were dropped by the audience filter.
    pub fn apply(&self, query: &str, mut docs: Vec<Document>) -> (Vec<Document>, AudienceFilterReport) {
        self.booster.apply(query, &mut docs);

        let mut report = AudienceFilterReport::default();
        let mut kept = Vec::with_capacity(docs.len());

        for doc in docs {
            match self.audience_verdict(&doc) {
                Verdict::Keep => kept.push(doc),
                Verdict::BlockedTitle => report.blocked += 1,
                Verdict::BlockedTextOrDomain => report.blocked_text_only += 1,
            }
        }

        (dedup(kept), report)
    }

    fn audience_verdict(&self, doc: &Document) -> Verdict {
        if let Some(url) = doc.url.first() {
            let host = url.to_ascii_lowercase();
            if self.block_domains.iter().any(|d| host.contains(d.as_str())) {
                return Verdict::BlockedTextOrDomain;
            }
        }

        if self.blocklist.iter().any(|re| re.is_match(&doc.title)) {
            return Verdict::BlockedTitle;
        }

        let snippet: String = doc.content.chars().take(512).collect();
        if self.blocklist.iter().any(|re| re.is_match(&snippet)) {
            return Verdict::BlockedTextOrDomain;
        }

        Verdict::Keep
    }
}

enum Verdict {
    Keep,
    BlockedTitle,
    BlockedTextOrDomain,
}

/// Dedups by `(lower(title), lower(first url))`, keeping the first (highest
/// upstream-ranked) occurrence, per spec §3's CandidatePool invariant.
fn dedup(docs: Vec<Document>) -> Vec<Document> {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    docs.into_iter().filter(|d| seen.insert(d.dedup_key())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filters() -> FilterConfig {
        FilterConfig::default()
    }
    fn boosts() -> BoostConfig {
        BoostConfig::default()
    }

    #[test]
    fn drops_k12_titles() {
        let pf = PostRetrievalFilters::new(&filters(), &boosts());
        let docs = vec![
            Document::new("1", "Grade 5 Lesson Plan on Climate", "content", 0.5),
            Document::new("2", "Climate Adaptation in Rexdale", "content", 0.5),
        ];
        let (kept, report) = pf.apply("climate", docs);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "2");
        assert_eq!(report.blocked, 1);
    }

    #[test]
    fn dedups_by_title_and_url() {
        let pf = PostRetrievalFilters::new(&filters(), &boosts());
        let docs = vec![
            Document::new("1", "Green Roofs", "c", 0.6).with_url("https://example.org/x"),
            Document::new("2", "green roofs", "c", 0.4).with_url("https://Example.org/X"),
        ];
        let (kept, _) = pf.apply("green roofs", docs);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "1");
    }

    #[test]
    fn blocks_by_content_snippet_not_title() {
        let pf = PostRetrievalFilters::new(&filters(), &boosts());
        let docs = vec![Document::new(
            "1",
            "Classroom Resources",
            "This kindergarten curriculum guide covers climate basics for kids.",
            0.5,
        )];
        let (kept, report) = pf.apply("climate", docs);
        assert!(kept.is_empty());
        assert_eq!(report.blocked, 1); // title itself contains "Classroom"
    }
}
