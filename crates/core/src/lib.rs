//! Core traits and types for the climate query pipeline
//!
//! This crate provides foundational types used across all other crates:
//! - Core traits for pluggable backends (LLM, retriever, translator)
//! - Language code handling
//! - Conversation turn types
//! - LLM request/response types
//! - Error types

pub mod answer;
pub mod conversation;
pub mod error;
pub mod language;
pub mod llm_types;
pub mod traits;

pub use answer::{Answer, CachedAnswer, Citation, ModelUsed, RetrievalSource};
pub use conversation::{Turn, TurnRole};
pub use error::{Error, Result};
pub use language::{is_backend_a_language, normalize_code, BACKEND_A_LANGS};
pub use llm_types::{
    FinishReason, GenerateRequest, GenerateResponse, Message, Role, StreamChunk, TokenUsage,
};

pub use traits::{Document, FilterOp, LanguageModel, MetadataFilter, Retriever, SparseVector, Translator};
