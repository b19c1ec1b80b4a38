//! Domain and topic boosting (part of C4 Post-retrieval Filters, spec §4.4).
//!
//! Grounded on the teacher's `rag/src/domain_boost.rs` `DomainBooster`
//! shape (a `RwLock`-guarded term dictionary consulted per document), but
//! the boost math is additive per spec §4.4 rather than the teacher's
//! multiplicative category boost, and the term content is re-authored for
//! climate domain boosts (preferred domains, how-to doc types, EV /
//! weatherize / heat-AQI topic clusters) rather than gold-loan/brand terms.

use regex::Regex;

use pipeline_config::BoostConfig;
use pipeline_core::Document;

/// Applies the two additive boosts of spec §4.4 steps 1-2: a domain boost
/// for preferred hosts, and a soft how-to/topic-cluster boost.
pub struct DomainBooster {
    preferred_domains: Vec<String>,
    domain_boost_weight: f32,
    doc_type_boost_weight: f32,
    topic_boost_weight: f32,
    howto_query_re: Regex,
    doc_type_markers: Vec<&'static str>,
    topic_keywords: Vec<Vec<String>>,
}

impl DomainBooster {
    pub fn new(config: &BoostConfig) -> Self {
        Self {
            preferred_domains: config
                .preferred_domains
                .iter()
                .map(|d| strip_www(d).to_ascii_lowercase())
                .collect(),
            domain_boost_weight: config.domain_boost_weight,
            doc_type_boost_weight: config.doc_type_boost_weight,
            topic_boost_weight: config.topic_boost_weight,
            howto_query_re: Regex::new(r"(?i)how to|tips|at home|safety|cost|guide|checklist|prepare|kit")
                .expect("static regex"),
            doc_type_markers: vec![
                "factsheet",
                "fact sheet",
                "guideline",
                "advisory",
                "toolkit",
                "checklist",
            ],
            topic_keywords: vec![
                config.topic_keywords_ev.clone(),
                config.topic_keywords_weatherize.clone(),
                config.topic_keywords_heat_aqi.clone(),
            ],
        }
    }

    /// Applies step 1 (domain boost) and step 2 (how-to soft boost, topic
    /// cluster boost) to `docs` in place, given the original `query` text.
    pub fn apply(&self, query: &str, docs: &mut [Document]) {
        let is_howto = self.howto_query_re.is_match(query);

        for doc in docs.iter_mut() {
            if self.matches_preferred_domain(doc) {
                doc.score += self.domain_boost_weight;
            }

            if is_howto && self.matches_doc_type(doc) {
                doc.score += self.doc_type_boost_weight;
            }

            if self.matches_topic_cluster(doc) {
                doc.score += self.topic_boost_weight;
            }
        }
    }

    fn matches_preferred_domain(&self, doc: &Document) -> bool {
        let Some(url) = doc.url.first() else { return false };
        let host = strip_www(url).to_ascii_lowercase();
        self.preferred_domains.iter().any(|d| host.contains(d.as_str()))
    }

    fn matches_doc_type(&self, doc: &Document) -> bool {
        let haystack = format!(
            "{} {}",
            doc.title.to_ascii_lowercase(),
            doc.url.first().cloned().unwrap_or_default().to_ascii_lowercase()
        );
        self.doc_type_markers.iter().any(|marker| haystack.contains(marker))
    }

    fn matches_topic_cluster(&self, doc: &Document) -> bool {
        let content = doc.content.to_ascii_lowercase();
        self.topic_keywords
            .iter()
            .any(|cluster| cluster.iter().any(|term| content.contains(&term.to_ascii_lowercase())))
    }
}

/// Detects a how-to query per spec §4.4/§4.5's shared regex
/// (`how to|tips|at home|safety|cost|guide|checklist|prepare|kit`, case
/// insensitive), reused by the Gate's how-to top-up (§4.5) as well as the
/// booster's soft how-to boost (§4.4 step 2). Constructed per call since
/// it runs at most once per request, well below the cost of a shared
/// static for this workload.
pub fn is_howto_query(query: &str) -> bool {
    Regex::new(r"(?i)how to|tips|at home|safety|cost|guide|checklist|prepare|kit")
        .expect("static regex")
        .is_match(query)
}

/// Strips a leading `www.` and scheme from a URL/host string, case-sensitively
/// preserving the rest for a subsequent case-insensitive comparison.
fn strip_www(url: &str) -> &str {
    let without_scheme = url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(url);
    without_scheme.strip_prefix("www.").unwrap_or(without_scheme)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BoostConfig {
        BoostConfig::default()
    }

    #[test]
    fn boosts_preferred_domain() {
        let booster = DomainBooster::new(&config());
        let mut docs = vec![Document::new("1", "Green Roofs", "content", 0.5).with_url("https://www.toronto.ca/green-roofs")];
        booster.apply("tell me about green roofs", &mut docs);
        assert!((docs[0].score - (0.5 + config().domain_boost_weight)).abs() < 1e-6);
    }

    #[test]
    fn soft_boosts_howto_factsheet() {
        let booster = DomainBooster::new(&config());
        let mut docs = vec![Document::new("1", "Heat Safety Factsheet", "stay cool", 0.4).with_url("https://example.org/x")];
        booster.apply("how to stay safe during a heat wave", &mut docs);
        assert!((docs[0].score - (0.4 + config().doc_type_boost_weight)).abs() < 1e-6);
    }

    #[test]
    fn no_boost_for_non_howto_query() {
        let booster = DomainBooster::new(&config());
        let mut docs = vec![Document::new("1", "Heat Safety Factsheet", "stay cool", 0.4).with_url("https://example.org/x")];
        booster.apply("what is the greenhouse effect", &mut docs);
        assert!((docs[0].score - 0.4).abs() < 1e-6);
    }

    #[test]
    fn topic_cluster_boost_applies_regardless_of_howto() {
        let booster = DomainBooster::new(&config());
        let mut docs = vec![Document::new("1", "EV Rebates", "electric vehicle incentives", 0.3).with_url("https://example.org/ev")];
        booster.apply("what is the greenhouse effect", &mut docs);
        assert!((docs[0].score - (0.3 + config().topic_boost_weight)).abs() < 1e-6);
    }
}
