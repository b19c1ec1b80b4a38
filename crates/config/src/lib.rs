//! Configuration management for the climate query pipeline
//!
//! Supports loading configuration from:
//! - YAML files, layered by `PIPELINE_ENV`
//! - Environment variables (`PIPELINE__` prefix, `__` nesting separator)
//! - Compiled-in defaults when no file/env override is present

pub mod prompts;
pub mod settings;

pub use prompts::{CannedTemplates, ClassifierInstructions, FallbackTemplates, PromptTemplates, SystemPrompt};
pub use settings::{
    AdaptiveMargin, BoostConfig, CacheConfig, EmbedderPathConfig, FilterConfig, InfraConfig,
    LlmBackendConfig, PipelineConfig, RateLimitConfig, RerankConfig, RetrievalConfig,
    RuntimeConfig, ServerConfig, Settings, TimeoutConfig, VectorIndexConfig, WebSearchConfig,
    load_settings,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Environment error: {0}")]
    Environment(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
