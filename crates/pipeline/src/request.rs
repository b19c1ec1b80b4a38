//! The `Query` entity (spec §3) and its validation (spec §8 boundary
//! behaviors: empty query, query over 1000 chars).

use pipeline_core::Turn;

const MAX_QUERY_CHARS: usize = 1000;

/// A single incoming request, immutable for the lifetime of the
/// Orchestrator's processing of it.
#[derive(Debug, Clone)]
pub struct Query {
    pub raw_text: String,
    pub selected_language_code: String,
    pub conversation_history: Vec<Turn>,
    pub request_id: String,
}

impl Query {
    pub fn new(raw_text: impl Into<String>, selected_language_code: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            selected_language_code: pipeline_core::normalize_code(&selected_language_code.into()),
            conversation_history: Vec::new(),
            request_id: request_id.into(),
        }
    }

    pub fn with_history(mut self, history: Vec<Turn>) -> Self {
        self.conversation_history = history;
        self
    }

    /// Validates the raw request body per spec §8's boundary behaviors.
    /// Returns the specific failure code on rejection.
    pub fn validate(&self) -> Result<(), crate::FailureCode> {
        if self.raw_text.trim().is_empty() {
            return Err(crate::FailureCode::EmptyQuery);
        }
        if self.raw_text.chars().count() > MAX_QUERY_CHARS {
            return Err(crate::FailureCode::TooLongQuery);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_is_rejected() {
        let query = Query::new("   ", "en", "r1");
        assert_eq!(query.validate(), Err(crate::FailureCode::EmptyQuery));
    }

    #[test]
    fn over_limit_query_is_rejected() {
        let query = Query::new("a".repeat(1001), "en", "r1");
        assert_eq!(query.validate(), Err(crate::FailureCode::TooLongQuery));
    }

    #[test]
    fn normal_query_is_valid() {
        let query = Query::new("What is climate change?", "en", "r1");
        assert!(query.validate().is_ok());
    }

    #[test]
    fn language_code_is_normalized() {
        let query = Query::new("hi", "  EN ", "r1");
        assert_eq!(query.selected_language_code, "en");
    }
}
