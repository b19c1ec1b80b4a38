//! C14 Pipeline Orchestrator (spec §4.14).
//!
//! Drives the full retrieve -> filter -> gate -> diversify -> rerank ->
//! finalize -> classify -> route -> generate -> check faithfulness ->
//! cache state machine described in §2 and §4.14, and owns the failure
//! taxonomy (§7) every stage's errors are mapped onto.

pub mod error;
pub mod orchestrator;
pub mod request;

pub use error::{FailureCode, PipelineError, PipelineFailure};
pub use orchestrator::Orchestrator;
pub use request::Query;
