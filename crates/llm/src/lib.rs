//! Generation backends and the generation-side pipeline stages (C9-C12)
//! for the climate query pipeline.
//!
//! - [`backend`] - HTTP chat-completion `LanguageModel` implementation,
//!   instantiated once per spec §4.10's Backend-A/Backend-B split.
//! - [`classifier`] - C9 Classifier/Rewriter
//! - [`router`] - C10 Model Router
//! - [`generator`] - C11 Response Generator
//! - [`faithfulness`] - C12 Faithfulness Guard

pub mod backend;
pub mod classifier;
pub mod faithfulness;
pub mod generator;
pub mod router;
pub mod translator;

pub use backend::{BackendConfig, HttpChatBackend};
pub use classifier::{Classifier, ClassifierResult};
pub use faithfulness::{FaithfulnessGuard, FaithfulnessOutcome, HttpWebSearchProvider, WebSearchProvider};
pub use generator::{Citation, GeneratedAnswer, ResponseGenerator};
pub use router::{ModelRouter, RouteResult, RoutedBackend};
pub use translator::LlmTranslator;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("generation failed: {0}")]
    Generation(String),

    #[error("classification failed: {0}")]
    Classification(String),
}

impl From<LlmError> for pipeline_core::Error {
    fn from(err: LlmError) -> Self {
        pipeline_core::Error::Llm(err.to_string())
    }
}
