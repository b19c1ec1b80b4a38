//! The `Answer` entity (spec §3), the pipeline's single response shape:
//! produced once per request by the Orchestrator, served over HTTP (§6.1)
//! and stored verbatim in the Redis response cache (§4.13, §6.6).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A citation surfaced alongside an answer, grounded in one document from
/// the `FinalSet` used by the Generator (spec §8 invariant #1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub title: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

/// Which generation backend produced an answer (spec §4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelUsed {
    BackendA,
    BackendB,
}

/// How an answer's content was sourced (spec §3 `Answer.retrieval_source`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalSource {
    Search,
    Canned,
    FallbackWeb,
}

/// The full response of one successful request (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub citations: Vec<Citation>,
    pub faithfulness_score: f32,
    pub model_used: ModelUsed,
    pub retrieval_source: RetrievalSource,
    pub processing_time_ms: u64,
    pub step_times_ms: HashMap<String, u64>,
    #[serde(default)]
    pub warnings: Vec<String>,
    pub language_used: String,
    pub request_id: String,
}

/// `Answer` plus cache bookkeeping (spec §3 `CachedAnswer`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedAnswer {
    #[serde(flatten)]
    pub answer: Answer,
    pub cached_at: chrono::DateTime<chrono::Utc>,
    pub language_code: String,
}
