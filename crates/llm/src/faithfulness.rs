//! C12 Faithfulness Guard (spec §4.12).
//!
//! Authored fresh per spec §4.12; reuses the classifier's tolerant
//! "extract a number from prose" idiom (here a float rather than a
//! classification token) and the `LanguageModel`-as-judge pattern already
//! established for the generator.

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;

use pipeline_core::{Document, Error, GenerateRequest, LanguageModel, Result};

const MAX_CONTEXT_WORDS: usize = 450;

/// Runs a web search and returns result snippets to ground a fallback
/// answer. No vendor SDK in the corpus exposes a generic search contract;
/// modeled as a trait per the teacher's pluggable-backend pattern.
#[async_trait]
pub trait WebSearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<Document>>;
}

/// HTTP-backed web search provider (spec §4.12's `WebSearchFallback`
/// outcome). Speaks a generic `{query} -> {results: [{title, url,
/// snippet}]}` shape since no search-vendor SDK appears anywhere in the
/// example pack.
pub struct HttpWebSearchProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpWebSearchProvider {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self { client: reqwest::Client::new(), endpoint: endpoint.into(), api_key }
    }
}

#[derive(Deserialize)]
struct WebSearchResponseBody {
    results: Vec<WebSearchResultItem>,
}

#[derive(Deserialize)]
struct WebSearchResultItem {
    title: String,
    url: String,
    snippet: String,
}

#[async_trait]
impl WebSearchProvider for HttpWebSearchProvider {
    async fn search(&self, query: &str) -> Result<Vec<Document>> {
        let mut request = self.client.get(&self.endpoint).query(&[("q", query)]);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let start = std::time::Instant::now();
        let response = request
            .send()
            .await
            .map_err(|e| Error::Llm(format!("web search request failed: {e}")))?;
        let parsed: WebSearchResponseBody = response
            .json()
            .await
            .map_err(|e| Error::Llm(format!("web search response parse failed: {e}")))?;

        tracing::debug!(dep = "web_search", op = "search", status = "OK", ms = start.elapsed().as_millis());

        Ok(parsed
            .results
            .into_iter()
            .map(|item| {
                Document::new(item.url.clone(), item.title, item.snippet, 0.0).with_url(item.url)
            })
            .collect())
    }
}

/// Faithfulness score in `[0, 1]` plus the policy decision that follows
/// from it (spec §4.12).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FaithfulnessOutcome {
    Accept,
    AcceptWithWarning,
    WebSearchFallback,
}

pub struct FaithfulnessGuard {
    threshold: f32,
    low_threshold: f32,
}

impl FaithfulnessGuard {
    pub fn new(threshold: f32, low_threshold: f32) -> Self {
        Self { threshold, low_threshold }
    }

    /// Scores `answer` against `contexts` for groundedness, per spec §4.12's
    /// rubric, truncating each context to `MAX_CONTEXT_WORDS`.
    pub async fn check(&self, judge: &dyn LanguageModel, question: &str, answer: &str, contexts: &[&str]) -> Result<f32> {
        let truncated: Vec<String> = contexts.iter().map(|c| truncate_words(c, MAX_CONTEXT_WORDS)).collect();
        let prompt = build_rubric_prompt(question, answer, &truncated);

        let request = GenerateRequest::new(prompt).with_temperature(0.0);
        let response = judge.generate(request).await?;

        Ok(extract_score(&response.text).unwrap_or(0.0))
    }

    pub fn decide(&self, score: f32) -> FaithfulnessOutcome {
        if score >= self.threshold {
            FaithfulnessOutcome::Accept
        } else if score < self.low_threshold {
            FaithfulnessOutcome::WebSearchFallback
        } else {
            FaithfulnessOutcome::AcceptWithWarning
        }
    }
}

fn build_rubric_prompt(question: &str, answer: &str, contexts: &[String]) -> String {
    let mut prompt = String::from(
        "Rate how well the answer is supported by the contexts on a scale from 0.0 to 1.0:\n\
         0.0 = fabricated, 0.4 = significant unsupported claims, 0.6 = mostly accurate, \
         0.8 = very accurate, 1.0 = fully supported.\n\
         Respond with a single number.\n\n",
    );
    prompt.push_str(&format!("Question: {question}\n\nAnswer: {answer}\n\nContexts:\n"));
    for (i, ctx) in contexts.iter().enumerate() {
        prompt.push_str(&format!("[{}] {}\n", i + 1, ctx));
    }
    prompt
}

fn truncate_words(text: &str, max_words: usize) -> String {
    text.split_whitespace().take(max_words).collect::<Vec<_>>().join(" ")
}

/// Extracts the first numeric value in `[0, 1]` from free-form judge output.
fn extract_score(text: &str) -> Option<f32> {
    let re = Regex::new(r"(\d+(?:\.\d+)?)").ok()?;
    for capture in re.captures_iter(text) {
        if let Ok(value) = capture[1].parse::<f32>() {
            if (0.0..=1.0).contains(&value) {
                return Some(value);
            }
            if (0.0..=100.0).contains(&value) {
                return Some(value / 100.0);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_leading_decimal_score() {
        assert_eq!(extract_score("Score: 0.85 (very accurate)"), Some(0.85));
    }

    #[test]
    fn extracts_whole_number_as_percentage() {
        assert_eq!(extract_score("I'd rate this 80 out of 100"), Some(0.80));
    }

    #[test]
    fn missing_score_returns_none() {
        assert_eq!(extract_score("no numbers here"), None);
    }

    #[test]
    fn decide_accepts_above_threshold() {
        let guard = FaithfulnessGuard::new(0.7, 0.1);
        assert_eq!(guard.decide(0.8), FaithfulnessOutcome::Accept);
    }

    #[test]
    fn decide_triggers_web_fallback_below_low_threshold() {
        let guard = FaithfulnessGuard::new(0.7, 0.1);
        assert_eq!(guard.decide(0.05), FaithfulnessOutcome::WebSearchFallback);
    }

    #[test]
    fn decide_accepts_with_warning_in_between() {
        let guard = FaithfulnessGuard::new(0.7, 0.1);
        assert_eq!(guard.decide(0.4), FaithfulnessOutcome::AcceptWithWarning);
    }

    #[test]
    fn truncates_to_max_words() {
        let long = (0..500).map(|i| i.to_string()).collect::<Vec<_>>().join(" ");
        let truncated = truncate_words(&long, MAX_CONTEXT_WORDS);
        assert_eq!(truncated.split_whitespace().count(), MAX_CONTEXT_WORDS);
    }
}
