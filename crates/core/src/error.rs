//! Crate-wide error type
//!
//! Every other crate defines its own `thiserror` enum and converts into
//! this one at its public boundary, the same way `rag::RagError` converts
//! into the core error type in the teacher repo.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("rag error: {0}")]
    Rag(String),

    #[error("llm error: {0}")]
    Llm(String),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("timeout after {0:?}")]
    Timeout(std::time::Duration),
}

pub type Result<T> = std::result::Result<T, Error>;
