//! C10 Model Router (spec §4.10).
//!
//! No teacher counterpart (the teacher routes STT/TTS by spoken language,
//! not a generation backend by classification output); authored fresh,
//! reusing `pipeline_core::is_backend_a_language`'s partition.

use std::sync::Arc;

use pipeline_core::{is_backend_a_language, LanguageModel};

/// Which generation backend a request was routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutedBackend {
    A,
    B,
}

/// Routing decision for one request.
pub struct RouteResult {
    pub backend: RoutedBackend,
    pub override_applied: bool,
    /// `rewrite_en` if present, else the raw query; used as the retrieval query.
    pub english_query: String,
}

/// Selects Backend-A or Backend-B for `expected_language`, honoring the
/// `force_backend_a` global override.
pub struct ModelRouter {
    backend_a: Arc<dyn LanguageModel>,
    backend_b: Arc<dyn LanguageModel>,
    force_backend_a: bool,
}

impl ModelRouter {
    pub fn new(backend_a: Arc<dyn LanguageModel>, backend_b: Arc<dyn LanguageModel>, force_backend_a: bool) -> Self {
        Self { backend_a, backend_b, force_backend_a }
    }

    pub fn route(&self, expected_language: &str, rewrite_en: Option<&str>, raw_query: &str) -> RouteResult {
        let by_language = is_backend_a_language(expected_language);
        let backend = if self.force_backend_a || by_language { RoutedBackend::A } else { RoutedBackend::B };

        RouteResult {
            backend,
            override_applied: self.force_backend_a && !by_language,
            english_query: rewrite_en.unwrap_or(raw_query).to_string(),
        }
    }

    pub fn model_for(&self, backend: RoutedBackend) -> Arc<dyn LanguageModel> {
        match backend {
            RoutedBackend::A => Arc::clone(&self.backend_a),
            RoutedBackend::B => Arc::clone(&self.backend_b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::Stream;
    use std::pin::Pin;
    use pipeline_core::{GenerateRequest, GenerateResponse, Result, StreamChunk};

    struct Mock(&'static str);

    #[async_trait]
    impl LanguageModel for Mock {
        async fn generate(&self, _request: GenerateRequest) -> Result<GenerateResponse> {
            Ok(GenerateResponse::text(self.0))
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
            self.0
        }
    }

    fn router(force: bool) -> ModelRouter {
        ModelRouter::new(Arc::new(Mock("a")), Arc::new(Mock("b")), force)
    }

    #[test]
    fn routes_backend_a_languages_to_a() {
        let r = router(false);
        assert_eq!(r.route("en", None, "q").backend, RoutedBackend::A);
        assert_eq!(r.route("es", None, "q").backend, RoutedBackend::A);
    }

    #[test]
    fn routes_other_languages_to_b() {
        let r = router(false);
        assert_eq!(r.route("hi", None, "q").backend, RoutedBackend::B);
    }

    #[test]
    fn force_backend_a_overrides() {
        let r = router(true);
        let result = r.route("hi", None, "q");
        assert_eq!(result.backend, RoutedBackend::A);
        assert!(result.override_applied);
    }

    #[test]
    fn english_query_prefers_rewrite() {
        let r = router(false);
        let result = r.route("es", Some("what is climate change"), "que es el cambio climatico");
        assert_eq!(result.english_query, "what is climate change");
    }
}
