//! LLM-backed `Translator` (spec §4.9's non-English climate guard, §4.12's
//! faithfulness re-check). The original Python service and every other
//! example repo's translators wrap a dedicated model or vendor API; since
//! this workspace has no translation-specific model or vendor dependency
//! in its stack, translation is done with the same chat backend already
//! wired for generation, the same "reuse what's already a collaborator"
//! choice `ResponseGenerator` makes for its own translate-back step.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use pipeline_core::{GenerateRequest, LanguageModel, Result, Translator};

/// Translates and detects language by prompting an existing
/// [`LanguageModel`] backend rather than a dedicated translation model.
pub struct LlmTranslator {
    llm: std::sync::Arc<dyn LanguageModel>,
}

impl LlmTranslator {
    pub fn new(llm: std::sync::Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Translator for LlmTranslator {
    async fn translate(&self, text: &str, from: &str, to: &str) -> Result<String> {
        if from == to {
            return Ok(text.to_string());
        }
        let request = GenerateRequest::new(format!(
            "Translate the user's message from language code \"{from}\" to language code \"{to}\". \
             Reply with only the translation, no commentary."
        ))
        .with_user_message(text)
        .with_temperature(0.0);

        let response = self.llm.generate(request).await?;
        Ok(response.text.trim().to_string())
    }

    async fn detect_language(&self, text: &str) -> Result<String> {
        let request = GenerateRequest::new(
            "Identify the ISO-639-1 language code of the user's message. \
             Reply with only the two-letter code, lowercase.",
        )
        .with_user_message(text)
        .with_temperature(0.0);

        let response = self.llm.generate(request).await?;
        let code: String = response
            .text
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .take(2)
            .collect::<String>()
            .to_lowercase();

        if code.len() == 2 {
            Ok(code)
        } else {
            Ok("en".to_string())
        }
    }

    fn translate_stream<'a>(
        &'a self,
        _text_stream: Pin<Box<dyn Stream<Item = String> + Send + 'a>>,
        _from: &'a str,
        _to: &'a str,
    ) -> Pin<Box<dyn Stream<Item = Result<String>> + Send + 'a>> {
        Box::pin(futures::stream::empty())
    }

    fn supports_pair(&self, _from: &str, _to: &str) -> bool {
        true
    }

    fn name(&self) -> &str {
        "llm-translator"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline_core::{GenerateResponse, StreamChunk};

    struct EchoLlm;

    #[async_trait]
    impl LanguageModel for EchoLlm {
        async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse> {
            let last = request.messages.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(GenerateResponse::text(format!("es-{last}")))
        }

        fn generate_stream<'a>(
            &'a self,
            _request: GenerateRequest,
        ) -> Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send + 'a>> {
            Box::pin(futures::stream::empty())
        }

        async fn is_available(&self) -> bool {
            true
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    #[tokio::test]
    async fn same_language_pair_is_a_no_op() {
        let translator = LlmTranslator::new(std::sync::Arc::new(EchoLlm));
        let out = translator.translate("hello", "en", "en").await.unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn translate_calls_through_to_the_backend() {
        let translator = LlmTranslator::new(std::sync::Arc::new(EchoLlm));
        let out = translator.translate("hola", "es", "en").await.unwrap();
        assert_eq!(out, "es-hola");
    }

    #[tokio::test]
    async fn detect_language_falls_back_to_english_on_malformed_reply() {
        struct Garbage;
        #[async_trait]
        impl LanguageModel for Garbage {
            async fn generate(&self, _request: GenerateRequest) -> Result<GenerateResponse> {
                Ok(GenerateResponse::text("42"))
            }
            fn generate_stream<'a>(
                &'a self,
                _request: GenerateRequest,
            ) -> Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send + 'a>> {
                Box::pin(futures::stream::empty())
            }
            async fn is_available(&self) -> bool {
                true
            }
            fn model_name(&self) -> &str {
                "garbage"
            }
        }

        let translator = LlmTranslator::new(std::sync::Arc::new(Garbage));
        let out = translator.detect_language("bonjour").await.unwrap();
        assert_eq!(out, "en");
    }
}
