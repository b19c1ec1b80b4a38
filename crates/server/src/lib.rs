//! HTTP surface (spec §6.1) over the climate query pipeline's
//! `pipeline_orchestrator::Orchestrator`.
//!
//! Deliberately thin: sessions, auth, and feedback storage are external
//! collaborators per spec §1, not things this crate implements. What it
//! does own is request validation, the JSON request/response shapes of
//! §6.1, and translating the pipeline's internal `FailureCode` taxonomy
//! onto the closed set of HTTP error codes the spec names.

pub mod http;
pub mod rate_limit;
pub mod state;

pub use http::create_router;
pub use state::AppState;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Serialize;

use pipeline_orchestrator::{FailureCode, PipelineFailure};

/// Everything the HTTP layer can fail with; wraps the pipeline's own
/// failure taxonomy plus the one additional case (rate limiting) that
/// only exists at the HTTP boundary.
#[derive(Debug)]
pub enum ServerError {
    Pipeline(PipelineFailure),
    RateLimited,
}

impl From<PipelineFailure> for ServerError {
    fn from(failure: PipelineFailure) -> Self {
        ServerError::Pipeline(failure)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, code, message) = match self {
            ServerError::Pipeline(failure) => (status_for(failure.code), http_code(failure.code), failure.message),
            ServerError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED", "Too many requests.".to_string()),
        };

        (status, Json(ErrorBody { success: false, error: ErrorDetail { code, message } })).into_response()
    }
}

/// Maps the pipeline's internal failure taxonomy (spec §4.14, §7) onto
/// the HTTP status codes of spec §6.1. `OffTopic`/`HarmfulQuery`/
/// `LanguageMismatch` are 400s per §8 scenarios S4/S5's literal
/// acceptance criteria ("Expected: HTTP 400"); `RetrievalEmpty` is a 5xx
/// since §6.1's closed 4xx `error.code` set has no member for it.
fn status_for(code: FailureCode) -> StatusCode {
    match code {
        FailureCode::EmptyQuery
        | FailureCode::TooLongQuery
        | FailureCode::OffTopic
        | FailureCode::HarmfulQuery
        | FailureCode::LanguageMismatch => StatusCode::BAD_REQUEST,
        FailureCode::RetrievalEmpty | FailureCode::GenerationFailed | FailureCode::InternalError => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Maps the pipeline's internal failure taxonomy onto the closed error
/// `code` enum spec §6.1 names verbatim (`OFF_TOPIC_QUERY`,
/// `HARMFUL_QUERY`, `LANGUAGE_MISMATCH`, `VALIDATION_ERROR`,
/// `RATE_LIMITED`); failure modes outside that closed set (empty
/// retrieval, generation, internal) are 5xx (see `status_for`) and use
/// `INTERNAL_ERROR`, which is not a 4xx code and so doesn't violate the
/// closed set.
fn http_code(code: FailureCode) -> &'static str {
    match code {
        FailureCode::EmptyQuery | FailureCode::TooLongQuery => "VALIDATION_ERROR",
        FailureCode::OffTopic => "OFF_TOPIC_QUERY",
        FailureCode::HarmfulQuery => "HARMFUL_QUERY",
        FailureCode::LanguageMismatch => "LANGUAGE_MISMATCH",
        FailureCode::RetrievalEmpty | FailureCode::GenerationFailed | FailureCode::InternalError => "INTERNAL_ERROR",
    }
}
