//! Text processing traits
//!
//! Grounded on the teacher's `core/src/traits/text_processing.rs`;
//! `GrammarCorrector`, `PIIRedactor` and `ComplianceChecker` have no
//! counterpart (PII/compliance are explicit non-goals) and are dropped.
//! `Translator` survives as the "translate helper" collaborator used by
//! the non-English climate guard (spec §4.9) and the faithfulness guard's
//! answer re-check (spec §4.12); language pairs are plain ISO-639-1
//! strings rather than the teacher's closed `Language` enum.

use async_trait::async_trait;
use std::pin::Pin;
use futures::Stream;
use crate::Result;

/// Translation interface.
///
/// # Example
///
/// ```ignore
/// let translator: Box<dyn Translator> = Box::new(SomeTranslator::new(config));
/// let english = translator.translate("¿Qué hace Rexdale por el clima?", "es", "en").await?;
/// // "What is Rexdale doing about climate?"
/// ```
#[async_trait]
pub trait Translator: Send + Sync + 'static {
    /// Translate `text` from `from` to `to` (ISO-639-1 codes).
    async fn translate(&self, text: &str, from: &str, to: &str) -> Result<String>;

    /// Detect the language of `text`, returning an ISO-639-1 code.
    async fn detect_language(&self, text: &str) -> Result<String>;

    /// Stream translation sentence-by-sentence.
    fn translate_stream<'a>(
        &'a self,
        text_stream: Pin<Box<dyn Stream<Item = String> + Send + 'a>>,
        from: &'a str,
        to: &'a str,
    ) -> Pin<Box<dyn Stream<Item = Result<String>> + Send + 'a>>;

    /// Whether this implementation supports a given language pair.
    fn supports_pair(&self, from: &str, to: &str) -> bool;

    /// Translator name for logging.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockTranslator;

    #[async_trait]
    impl Translator for MockTranslator {
        async fn translate(&self, text: &str, _from: &str, _to: &str) -> Result<String> {
            Ok(format!("[Translated: {}]", text))
        }

        async fn detect_language(&self, _text: &str) -> Result<String> {
            Ok("es".to_string())
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
            "mock-translator"
        }
    }

    #[tokio::test]
    async fn mock_translator_roundtrip() {
        let translator = MockTranslator;
        assert!(translator.supports_pair("es", "en"));

        let result = translator.translate("Hola", "es", "en").await.unwrap();
        assert!(result.contains("Translated"));
    }
}
