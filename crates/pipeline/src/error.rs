//! Failure taxonomy (spec §4.14, §7) and the crate-local error type.

use thiserror::Error;

/// The closed set of failure codes an unsuccessful request can surface
/// (spec §4.14). Serialized as the snake_case strings the spec names
/// verbatim, so the HTTP layer and the cache key never need a translation
/// table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureCode {
    EmptyQuery,
    TooLongQuery,
    OffTopic,
    HarmfulQuery,
    LanguageMismatch,
    RetrievalEmpty,
    GenerationFailed,
    InternalError,
}

impl FailureCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCode::EmptyQuery => "empty_query",
            FailureCode::TooLongQuery => "too_long_query",
            FailureCode::OffTopic => "off_topic",
            FailureCode::HarmfulQuery => "harmful_query",
            FailureCode::LanguageMismatch => "language_mismatch",
            FailureCode::RetrievalEmpty => "retrieval_empty",
            FailureCode::GenerationFailed => "generation_failed",
            FailureCode::InternalError => "internal_error",
        }
    }
}

impl std::fmt::Display for FailureCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A failed request's full error payload (spec §4.14:
/// `{success:false, error:{code, message}}`).
#[derive(Debug, Clone)]
pub struct PipelineFailure {
    pub code: FailureCode,
    pub message: String,
}

impl PipelineFailure {
    pub fn new(code: FailureCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("rag error: {0}")]
    Rag(String),

    #[error("llm error: {0}")]
    Llm(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<pipeline_core::Error> for PipelineError {
    fn from(err: pipeline_core::Error) -> Self {
        match err {
            pipeline_core::Error::Rag(msg) => PipelineError::Rag(msg),
            pipeline_core::Error::Llm(msg) => PipelineError::Llm(msg),
            other => PipelineError::Internal(other.to_string()),
        }
    }
}

impl From<PipelineError> for pipeline_core::Error {
    fn from(err: PipelineError) -> Self {
        pipeline_core::Error::Internal(err.to_string())
    }
}
