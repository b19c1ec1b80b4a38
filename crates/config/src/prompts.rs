//! Prompt and canned-text templates.
//!
//! Grounded on the teacher's `config/src/prompts.rs` structural pattern
//! (`Default`-constructed template structs plus a `build()` method); all
//! content is rewritten for climate-QA rather than gold-loan sales, and
//! the sales-funnel stage prompts (`greeting/discovery/presentation/...`)
//! have no counterpart and are dropped in favor of the canned-response
//! categories of spec §4.9 (greeting/goodbye/thanks/emergency/
//! instruction) and the per-language climate keyword sets of spec §9.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Full set of text templates consumed by the classifier, generator and
/// orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptTemplates {
    #[serde(default)]
    pub system_prompt: SystemPrompt,
    #[serde(default)]
    pub classifier: ClassifierInstructions,
    #[serde(default)]
    pub canned: CannedTemplates,
    #[serde(default)]
    pub fallbacks: FallbackTemplates,
    /// Per-language climate keyword sets used by the classifier's
    /// non-English climate guard (spec §4.9, §9). Keyed by ISO-639-1 code;
    /// `"en"` is always present and used as the default when a language
    /// has no dedicated entry.
    #[serde(default = "default_climate_keywords")]
    pub climate_keywords: HashMap<String, Vec<String>>,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            system_prompt: SystemPrompt::default(),
            classifier: ClassifierInstructions::default(),
            canned: CannedTemplates::default(),
            fallbacks: FallbackTemplates::default(),
            climate_keywords: default_climate_keywords(),
        }
    }
}

impl PromptTemplates {
    /// Climate keyword set for `language`, falling back to English.
    pub fn keywords_for(&self, language: &str) -> &[String] {
        self.climate_keywords
            .get(language)
            .or_else(|| self.climate_keywords.get("en"))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Looks up a canned response for `(classification, language)`,
    /// falling back to English if the language has no dedicated text.
    pub fn canned_text(&self, classification: &str, language: &str) -> Option<&str> {
        self.canned.get(classification, language)
    }
}

fn default_climate_keywords() -> HashMap<String, Vec<String>> {
    let mut m = HashMap::new();
    m.insert(
        "en".to_string(),
        vec![
            "climate", "weather", "flood", "flooding", "heat", "emissions", "adaptation",
            "aqi", "air quality", "renewable", "drought", "wildfire", "sea level", "storm",
        ]
        .into_iter()
        .map(str::to_string)
        .collect(),
    );
    m.insert(
        "es".to_string(),
        vec![
            "clima", "tiempo", "inundación", "calor", "emisiones", "adaptación",
            "calidad del aire", "renovable", "sequía", "incendio forestal", "tormenta",
        ]
        .into_iter()
        .map(str::to_string)
        .collect(),
    );
    m.insert(
        "de".to_string(),
        vec![
            "klima", "wetter", "überschwemmung", "hitze", "emissionen", "anpassung",
            "luftqualität", "erneuerbar", "dürre", "waldbrand", "sturm",
        ]
        .into_iter()
        .map(str::to_string)
        .collect(),
    );
    m.insert(
        "fr".to_string(),
        vec![
            "climat", "météo", "inondation", "chaleur", "émissions", "adaptation",
            "qualité de l'air", "renouvelable", "sécheresse", "incendie de forêt", "tempête",
        ]
        .into_iter()
        .map(str::to_string)
        .collect(),
    );
    m.insert(
        "pt".to_string(),
        vec![
            "clima", "tempo", "inundação", "calor", "emissões", "adaptação",
            "qualidade do ar", "renovável", "seca", "incêndio florestal", "tempestade",
        ]
        .into_iter()
        .map(str::to_string)
        .collect(),
    );
    m
}

/// System prompt for the Response Generator (C11).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemPrompt {
    pub role: String,
    pub instructions: Vec<String>,
    pub guidelines: Vec<String>,
    pub avoid: Vec<String>,
}

impl Default for SystemPrompt {
    fn default() -> Self {
        Self {
            role: "You are a grounded climate-information assistant. You answer questions \
                   about climate change, local climate action, and adaptation using only the \
                   supplied documents."
                .to_string(),
            instructions: vec![
                "Answer using only the provided documents; do not invent facts.".to_string(),
                "Cite every claim back to a supplied document's title and URL.".to_string(),
                "Respond in the user's expected language.".to_string(),
                "Use the conversation history to resolve follow-up questions.".to_string(),
                "If the documents don't answer the question, say so plainly.".to_string(),
            ],
            guidelines: vec![
                "Be concise and factual.".to_string(),
                "Prefer plain language over jargon.".to_string(),
                "Keep a neutral, informative tone.".to_string(),
            ],
            avoid: vec![
                "Citing a URL that is not in the supplied documents.".to_string(),
                "Speculating beyond what the documents support.".to_string(),
                "Answering questions unrelated to climate.".to_string(),
            ],
        }
    }
}

impl SystemPrompt {
    /// Build the full system prompt text for the generator.
    pub fn build(&self) -> String {
        let mut prompt = format!("{}\n\n", self.role);

        prompt.push_str("## Instructions\n");
        for instruction in &self.instructions {
            prompt.push_str(&format!("- {}\n", instruction));
        }

        prompt.push_str("\n## Guidelines\n");
        for guideline in &self.guidelines {
            prompt.push_str(&format!("- {}\n", guideline));
        }

        prompt.push_str("\n## Avoid\n");
        for avoid in &self.avoid {
            prompt.push_str(&format!("- {}\n", avoid));
        }

        prompt
    }
}

/// Fixed instruction text for the Classifier/Rewriter (C9), per spec §6.3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierInstructions {
    pub preamble: String,
    pub schema_note: String,
}

impl Default for ClassifierInstructions {
    fn default() -> Self {
        Self {
            preamble: "You classify a climate-information chat query. Detect the query's \
                       language, decide whether it matches the user's expected language, \
                       classify the query, and rewrite it to a self-contained canonical \
                       English query suitable for retrieval."
                .to_string(),
            schema_note: "Respond with a single JSON object matching the schema exactly; \
                          do not include any other text."
                .to_string(),
        }
    }
}

/// Canned text for intents that short-circuit retrieval/generation
/// (spec §4.9: greeting, goodbye, thanks, emergency, instruction).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CannedTemplates {
    pub greeting: HashMap<String, String>,
    pub goodbye: HashMap<String, String>,
    pub thanks: HashMap<String, String>,
    pub emergency: HashMap<String, String>,
    pub instruction: HashMap<String, String>,
}

impl Default for CannedTemplates {
    fn default() -> Self {
        Self {
            greeting: HashMap::from([
                ("en".to_string(), "Hello! Ask me anything about climate change and local climate action.".to_string()),
                ("es".to_string(), "¡Hola! Pregúntame lo que quieras sobre el cambio climático y la acción climática local.".to_string()),
            ]),
            goodbye: HashMap::from([
                ("en".to_string(), "Goodbye! Feel free to come back with more climate questions anytime.".to_string()),
                ("es".to_string(), "¡Adiós! No dudes en volver con más preguntas sobre el clima.".to_string()),
            ]),
            thanks: HashMap::from([
                ("en".to_string(), "You're welcome! Let me know if you have more climate questions.".to_string()),
                ("es".to_string(), "¡De nada! Avísame si tienes más preguntas sobre el clima.".to_string()),
            ]),
            emergency: HashMap::from([
                (
                    "en".to_string(),
                    "If this is a life-threatening emergency, please contact your local \
                     emergency services immediately. I can help with general climate \
                     information, but I am not an emergency response service."
                        .to_string(),
                ),
            ]),
            instruction: HashMap::from([
                (
                    "en".to_string(),
                    "Ask me a question about climate change, its local impacts, or climate \
                     action, and I'll answer using up-to-date sources with citations."
                        .to_string(),
                ),
            ]),
        }
    }
}

impl CannedTemplates {
    /// Looks up canned text for a classification ("greeting", "goodbye",
    /// "thanks", "emergency", "instruction") and language, falling back
    /// to English.
    pub fn get(&self, classification: &str, language: &str) -> Option<&str> {
        let table = match classification {
            "greeting" => &self.greeting,
            "goodbye" => &self.goodbye,
            "thanks" => &self.thanks,
            "emergency" => &self.emergency,
            "instruction" => &self.instruction,
            _ => return None,
        };
        table
            .get(language)
            .or_else(|| table.get("en"))
            .map(|s| s.as_str())
    }
}

/// Fallback/error-path user-visible text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackTemplates {
    pub language_mismatch: String,
    pub off_topic: String,
    pub harmful_query: String,
    pub retrieval_empty: String,
    pub internal_error: String,
}

impl Default for FallbackTemplates {
    fn default() -> Self {
        Self {
            language_mismatch: "It looks like your message is in a different language than \
                                the one selected. Please switch the selected language or \
                                rephrase your question."
                .to_string(),
            off_topic: "I can only help with questions about climate change and climate \
                        action. Could you ask something in that area?"
                .to_string(),
            harmful_query: "I can't help with that request.".to_string(),
            retrieval_empty: "I couldn't find relevant sources for that question. Could you \
                              try rephrasing it?"
                .to_string(),
            internal_error: "Something went wrong while processing your question. Please try \
                             again in a moment."
                .to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_templates_are_populated() {
        let templates = PromptTemplates::default();
        assert!(!templates.system_prompt.instructions.is_empty());
        assert!(templates.climate_keywords.contains_key("en"));
    }

    #[test]
    fn system_prompt_build_contains_sections() {
        let templates = PromptTemplates::default();
        let prompt = templates.system_prompt.build();
        assert!(prompt.contains("Instructions"));
        assert!(prompt.contains("Guidelines"));
        assert!(prompt.contains("Avoid"));
    }

    #[test]
    fn canned_text_falls_back_to_english() {
        let templates = PromptTemplates::default();
        assert!(templates.canned_text("greeting", "de").is_some());
        assert_eq!(
            templates.canned_text("greeting", "de"),
            templates.canned.greeting.get("en").map(|s| s.as_str())
        );
    }

    #[test]
    fn canned_text_unknown_classification_is_none() {
        let templates = PromptTemplates::default();
        assert!(templates.canned_text("on-topic", "en").is_none());
    }

    #[test]
    fn climate_keywords_fallback_to_english() {
        let templates = PromptTemplates::default();
        assert_eq!(templates.keywords_for("zz"), templates.keywords_for("en"));
    }
}
