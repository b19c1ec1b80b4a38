//! Pipeline settings: the closed configuration set of spec §6.5.
//!
//! Grounded on the teacher's `config/src/lib.rs` (`ConfigError`,
//! `From<config::ConfigError>`) plus the `config` crate's layered
//! file+env loading convention; `settings.rs`/`pipeline.rs` themselves
//! were absent from the retrieved pack, so the shape here is authored
//! directly from the spec's closed option list rather than adapted from
//! teacher source.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Adaptive similarity margin bounds (spec §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveMargin {
    pub enabled: bool,
    pub min: f32,
    pub max: f32,
}

impl Default for AdaptiveMargin {
    fn default() -> Self {
        Self {
            enabled: true,
            min: 0.04,
            max: 0.10,
        }
    }
}

/// Retrieval knobs (spec §6.5 "Retrieval").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub top_k_retrieve: usize,
    pub top_k_rerank: usize,
    pub hybrid_alpha: f32,
    pub overfetch: usize,
    pub similarity_base: f32,
    pub similarity_fallback: f32,
    pub adaptive_margin: AdaptiveMargin,
    pub min_kept: usize,
    pub refill_enabled: bool,
    pub refill_overfetch: usize,
    pub mmr_enabled: bool,
    pub mmr_lambda: f32,
    pub mmr_overfetch: usize,
    pub min_pinecone_score: Option<f32>,
    pub min_rerank_score: f32,
    pub hard_floor: f32,
    pub max_docs_before_rerank: usize,
    pub final_max_docs: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k_retrieve: 20,
            top_k_rerank: 10,
            hybrid_alpha: 0.5,
            overfetch: 30,
            similarity_base: 0.65,
            similarity_fallback: 0.45,
            adaptive_margin: AdaptiveMargin::default(),
            min_kept: 3,
            refill_enabled: true,
            refill_overfetch: 40,
            mmr_enabled: true,
            mmr_lambda: 0.30,
            mmr_overfetch: 12,
            min_pinecone_score: None,
            min_rerank_score: 0.60,
            hard_floor: 0.60,
            max_docs_before_rerank: 20,
            final_max_docs: 5,
        }
    }
}

/// Post-retrieval filter knobs (spec §6.5 "Filters").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    pub lang: Option<String>,
    #[serde(default)]
    pub audience_blocklist_regex: Vec<String>,
    #[serde(default)]
    pub doc_type_preferences_howto: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            lang: None,
            audience_blocklist_regex: vec![
                r"(?i)grade\s?\d".to_string(),
                r"(?i)lesson plan".to_string(),
                r"(?i)classroom".to_string(),
                r"(?i)curriculum".to_string(),
                r"(?i)k-?12".to_string(),
                r"(?i)kindergarten".to_string(),
            ],
            doc_type_preferences_howto: vec![
                "factsheet".to_string(),
                "fact sheet".to_string(),
                "guideline".to_string(),
                "advisory".to_string(),
                "toolkit".to_string(),
                "checklist".to_string(),
            ],
        }
    }
}

/// Domain/topic boost knobs (spec §6.5 "Boosts").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostConfig {
    #[serde(default)]
    pub preferred_domains: Vec<String>,
    pub domain_boost_weight: f32,
    pub topic_keywords_ev: Vec<String>,
    pub topic_keywords_weatherize: Vec<String>,
    pub topic_keywords_heat_aqi: Vec<String>,
    pub doc_type_boost_weight: f32,
    pub topic_boost_weight: f32,
}

impl Default for BoostConfig {
    fn default() -> Self {
        Self {
            preferred_domains: vec!["toronto.ca".to_string(), "canada.ca".to_string()],
            domain_boost_weight: 0.08,
            topic_keywords_ev: vec!["ev".to_string(), "evse".to_string(), "electric vehicle".to_string()],
            topic_keywords_weatherize: vec!["weatherize".to_string(), "insulation".to_string(), "draft-proof".to_string()],
            topic_keywords_heat_aqi: vec!["heat".to_string(), "aqi".to_string(), "air quality".to_string()],
            doc_type_boost_weight: 0.05,
            topic_boost_weight: 0.03,
        }
    }
}

/// Per-stage timeout budgets consumed by the Orchestrator (spec §4.14, §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    pub classify_ms: u64,
    pub retrieval_ms: u64,
    pub rerank_ms: u64,
    pub generate_ms: u64,
    pub faithfulness_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            classify_ms: 6_000,
            retrieval_ms: 8_000,
            rerank_ms: 10_000,
            generate_ms: 20_000,
            faithfulness_ms: 8_000,
        }
    }
}

impl TimeoutConfig {
    pub fn classify(&self) -> Duration {
        Duration::from_millis(self.classify_ms)
    }
    pub fn retrieval(&self) -> Duration {
        Duration::from_millis(self.retrieval_ms)
    }
    pub fn rerank(&self) -> Duration {
        Duration::from_millis(self.rerank_ms)
    }
    pub fn generate(&self) -> Duration {
        Duration::from_millis(self.generate_ms)
    }
    pub fn faithfulness(&self) -> Duration {
        Duration::from_millis(self.faithfulness_ms)
    }
}

/// Redis cache connection settings (spec §6.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub host: String,
    pub port: u16,
    pub ssl: bool,
    pub ttl_s: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            ssl: false,
            ttl_s: 3600,
        }
    }
}

/// Server binding and rate-limit settings (ambient; not part of the
/// core pipeline but needed to run it behind the HTTP surface of §6.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub cors_enabled: bool,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_enabled: true,
            cors_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            burst: 10,
        }
    }
}

/// Runtime knobs (spec §6.5 "Runtime").
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RuntimeConfig {
    pub force_backend_a: bool,
    pub faithfulness_threshold: f32,
    pub faithfulness_low_threshold: f32,
}

/// One LLM backend's connection info (spec §4.10's Backend-A/Backend-B
/// are named roles, not vendor endpoints; this is the deployment-time
/// wiring a real process needs, the same ambient role `CacheConfig`
/// plays for Redis).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmBackendConfig {
    pub model: String,
    pub endpoint: String,
    pub api_key: Option<String>,
}

/// Vector index connection info (spec §4.3 names the hybrid query shape,
/// not a deployment endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndexConfig {
    pub endpoint: String,
    pub collection: String,
}

impl Default for VectorIndexConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:6334".to_string(),
            collection: "climate_docs".to_string(),
        }
    }
}

/// Cross-encoder rerank provider connection info (spec §4.7,
/// `original_source/src/models/rerank.py`'s Cohere call). `enabled: false`
/// runs the reranker with `KeywordOverlapProvider` instead (spec §7's
/// "reranker failure -> identity order" degrade path extended to "no
/// provider configured").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankConfig {
    pub enabled: bool,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self { enabled: false, endpoint: None, api_key: None }
    }
}

/// Local embedding model location (spec §4.2 names the BGE-M3 family,
/// not a filesystem path).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedderPathConfig {
    pub model_dir: String,
    pub max_seq_len: usize,
}

impl Default for EmbedderPathConfig {
    fn default() -> Self {
        Self { model_dir: "models/bge-m3".to_string(), max_seq_len: 512 }
    }
}

/// Web search fallback provider connection info (spec §4.12's
/// `WebSearchFallback` outcome). `enabled: false` means the faithfulness
/// guard's web-search branch has no provider to call and falls through
/// to its "no web search provider configured" warning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchConfig {
    pub enabled: bool,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self { enabled: false, endpoint: None, api_key: None }
    }
}

/// Infrastructure endpoints the closed knob set of spec §6.5 doesn't
/// itemize because it is deployment wiring, not pipeline behavior —
/// the same role `CacheConfig`'s host/port/ssl fields already play.
/// Grouped separately from `PipelineConfig`'s other sections so the
/// spec's closed behavioral set stays visibly unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfraConfig {
    pub vector_index: VectorIndexConfig,
    pub backend_a: LlmBackendConfig,
    pub backend_b: LlmBackendConfig,
    pub rerank: RerankConfig,
    pub embedder: EmbedderPathConfig,
    pub web_search: WebSearchConfig,
}

impl Default for InfraConfig {
    fn default() -> Self {
        Self {
            vector_index: VectorIndexConfig::default(),
            backend_a: LlmBackendConfig {
                model: "command-a".to_string(),
                // Base URL only: `HttpChatBackend::endpoint_url`/`is_available`
                // append `/v1/chat/completions` and `/v1/models` themselves.
                endpoint: "http://127.0.0.1:11434".to_string(),
                api_key: None,
            },
            backend_b: LlmBackendConfig {
                model: "nova".to_string(),
                endpoint: "http://127.0.0.1:11435".to_string(),
                api_key: None,
            },
            rerank: RerankConfig::default(),
            embedder: EmbedderPathConfig::default(),
            web_search: WebSearchConfig::default(),
        }
    }
}

/// Top-level pipeline configuration: the union of every knob in spec §6.5
/// plus the ambient infra wiring (`infra`) a deployed process needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub retrieval: RetrievalConfig,
    pub filters: FilterConfig,
    pub boosts: BoostConfig,
    pub timeouts: TimeoutConfig,
    pub cache: CacheConfig,
    pub server: ServerConfig,
    pub rate_limit: RateLimitConfig,
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub infra: InfraConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retrieval: RetrievalConfig::default(),
            filters: FilterConfig::default(),
            boosts: BoostConfig::default(),
            timeouts: TimeoutConfig::default(),
            cache: CacheConfig::default(),
            server: ServerConfig::default(),
            rate_limit: RateLimitConfig::default(),
            runtime: RuntimeConfig {
                force_backend_a: false,
                faithfulness_threshold: 0.7,
                faithfulness_low_threshold: 0.1,
            },
            infra: InfraConfig::default(),
        }
    }
}

/// An alias kept for the re-export surface; `Settings` and `PipelineConfig`
/// name the same thing in this crate (the teacher splits `Settings` for
/// server/rate-limit concerns from `PipelineConfig` for pipeline knobs;
/// here they are unified since both are loaded from one file).
pub type Settings = PipelineConfig;

/// Loads configuration layered as `config/default.yaml` (if present),
/// then a file named by `PIPELINE_ENV` (e.g. `config/production.yaml`),
/// then environment variables prefixed `PIPELINE__` with `__` as the
/// nesting separator (e.g. `PIPELINE__RETRIEVAL__HYBRID_ALPHA=0.6`).
pub fn load_settings() -> Result<PipelineConfig, ConfigError> {
    let env = std::env::var("PIPELINE_ENV").unwrap_or_else(|_| "development".to_string());

    let builder = config::Config::builder()
        .add_source(config::File::with_name("config/default").required(false))
        .add_source(config::File::with_name(&format!("config/{env}")).required(false))
        .add_source(
            config::Environment::with_prefix("PIPELINE")
                .separator("__")
                .try_parsing(true),
        );

    let raw = builder.build()?;

    match raw.try_deserialize::<PipelineConfig>() {
        Ok(cfg) => Ok(cfg),
        Err(config::ConfigError::NotFound(_)) => Ok(PipelineConfig::default()),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_values() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.retrieval.final_max_docs, 5);
        assert_eq!(cfg.retrieval.hard_floor, 0.60);
        assert_eq!(cfg.cache.ttl_s, 3600);
        assert_eq!(cfg.runtime.faithfulness_threshold, 0.7);
    }

    #[test]
    fn load_settings_falls_back_to_defaults() {
        // With no config files and no env vars present, this should not fail.
        let cfg = load_settings();
        assert!(cfg.is_ok());
    }
}
