//! C11 Response Generator (spec §4.11).
//!
//! Grounded on `core/src/traits/llm.rs`'s `LanguageModel::generate` contract
//! and `GenerateRequest::with_user_message`/history-forwarding builder
//! pattern; the wall-clock budget and citation-from-context-only rule are
//! authored fresh from spec §4.11.

use std::sync::Arc;
use std::time::Duration;

use pipeline_config::PromptTemplates;
use pipeline_core::{Document, GenerateRequest, LanguageModel, Result, Translator, Turn};

/// A citation surfaced to the caller, grounded in one retrieved document.
#[derive(Debug, Clone)]
pub struct Citation {
    pub title: String,
    pub url: String,
}

/// Generated answer with citations restricted to the supplied documents
/// (spec §8 invariant #1: `citations ⊆ urls(FinalSet)`).
#[derive(Debug, Clone)]
pub struct GeneratedAnswer {
    pub text: String,
    pub citations: Vec<Citation>,
    pub truncated: bool,
}

pub struct ResponseGenerator {
    prompts: Arc<PromptTemplates>,
    translator: Option<Arc<dyn Translator>>,
}

impl ResponseGenerator {
    pub fn new(prompts: Arc<PromptTemplates>, translator: Option<Arc<dyn Translator>>) -> Self {
        Self { prompts, translator }
    }

    /// Generates an answer to `user_query_english` using `documents` as the
    /// only permitted source of facts and citations, forwarding
    /// `conversation_history` (already normalized to English) as alternating
    /// user/assistant messages. Applies `budget` as a wall-clock ceiling: on
    /// timeout, returns whatever was produced so far marked `truncated`.
    pub async fn generate(
        &self,
        llm: &dyn LanguageModel,
        user_query_english: &str,
        documents: &[Document],
        conversation_history: &[Turn],
        expected_language: &str,
        budget: Duration,
    ) -> Result<GeneratedAnswer> {
        let system_prompt = self.build_system_prompt(documents);
        let mut request = GenerateRequest::new(system_prompt);

        for turn in conversation_history {
            request = match turn.role {
                pipeline_core::TurnRole::User => request.with_user_message(turn.content.clone()),
                pipeline_core::TurnRole::Assistant => request.with_assistant_message(turn.content.clone()),
            };
        }
        request = request.with_user_message(user_query_english);

        let outcome = tokio::time::timeout(budget, llm.generate(request)).await;

        let (text, truncated) = match outcome {
            Ok(Ok(response)) => (response.text, false),
            Ok(Err(err)) => return Err(err),
            Err(_) => (String::new(), true),
        };

        let text = if expected_language != "en" && !text.is_empty() {
            self.translate_if_needed(&text, expected_language).await?
        } else {
            text
        };

        let citations = extract_citations(&text, documents);

        Ok(GeneratedAnswer { text, citations, truncated })
    }

    fn build_system_prompt(&self, documents: &[Document]) -> String {
        let mut prompt = self.prompts.system_prompt.build();
        prompt.push_str("\n## Source documents\n");
        for doc in documents {
            let url = doc.url.first().map(String::as_str).unwrap_or("");
            prompt.push_str(&format!("### {} ({})\n{}\n\n", doc.title, url, doc.content));
        }
        prompt
    }

    async fn translate_if_needed(&self, text: &str, expected_language: &str) -> Result<String> {
        match &self.translator {
            Some(translator) if translator.supports_pair("en", expected_language) => {
                translator.translate(text, "en", expected_language).await
            }
            _ => Ok(text.to_string()),
        }
    }
}

/// Keeps only citations whose URL appears among `documents`, per spec §8
/// invariant #1.
fn extract_citations(text: &str, documents: &[Document]) -> Vec<Citation> {
    documents
        .iter()
        .filter(|doc| doc.url.iter().any(|u| text.contains(u.as_str())) || text.contains(&doc.title))
        .filter_map(|doc| doc.url.first().map(|url| Citation { title: doc.title.clone(), url: url.clone() }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_citations_only_from_supplied_documents() {
        let docs = vec![
            Document::new("1", "Green Roofs", "content", 0.5).with_url("https://toronto.ca/green-roofs"),
            Document::new("2", "Heat Safety", "content", 0.5).with_url("https://toronto.ca/heat-safety"),
        ];
        let text = "See Green Roofs at https://toronto.ca/green-roofs for details.";
        let citations = extract_citations(text, &docs);
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].url, "https://toronto.ca/green-roofs");
    }

    #[test]
    fn extract_citations_empty_when_no_match() {
        let docs = vec![Document::new("1", "Green Roofs", "content", 0.5).with_url("https://toronto.ca/green-roofs")];
        let citations = extract_citations("unrelated text", &docs);
        assert!(citations.is_empty());
    }
}
