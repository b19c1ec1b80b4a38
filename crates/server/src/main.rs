//! Climate query pipeline server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use pipeline_cache::ResponseCache;
use pipeline_config::{load_settings, PipelineConfig, PromptTemplates};
use pipeline_llm::{
    BackendConfig, Classifier, FaithfulnessGuard, HttpChatBackend, HttpWebSearchProvider,
    LlmTranslator, ModelRouter, ResponseGenerator, WebSearchProvider,
};
use pipeline_orchestrator::Orchestrator;
use pipeline_core::Retriever as RetrieverTrait;
use pipeline_rag::{
    CandleEmbedder, EmbedderConfig, EmbeddingCache, HttpRerankProvider, HybridRetriever,
    KeywordOverlapProvider, QdrantIndex, RerankerClient, VectorIndex,
};
use pipeline_server::{create_router, AppState};

const EMBEDDING_CACHE_CAPACITY: usize = 4000;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match load_settings() {
        Ok(config) => {
            eprintln!("Loaded configuration (env: {})", std::env::var("PIPELINE_ENV").unwrap_or_else(|_| "development".to_string()));
            config
        }
        Err(err) => {
            eprintln!("Warning: failed to load config: {err}. Using defaults.");
            PipelineConfig::default()
        }
    };

    init_tracing();
    tracing::info!("starting climate query pipeline server v{}", env!("CARGO_PKG_VERSION"));

    let orchestrator = build_orchestrator(&config).await?;
    let state = AppState::new(Arc::new(orchestrator), Arc::new(config.clone()));
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], config.server.port)));
    tracing::info!(%addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shutdown complete");
    Ok(())
}

/// Wires every Orchestrator collaborator from `config` (spec §4.14's
/// "every long-lived collaborator constructed once at startup").
async fn build_orchestrator(config: &PipelineConfig) -> Result<Orchestrator, Box<dyn std::error::Error>> {
    let prompts = Arc::new(PromptTemplates::default());

    let cache = Arc::new(ResponseCache::connect(&config.cache.host, config.cache.port, config.cache.ssl, config.cache.ttl_s).await);

    let embedder_config = EmbedderConfig {
        model_dir: config.infra.embedder.model_dir.clone().into(),
        max_seq_len: config.infra.embedder.max_seq_len,
    };
    let embedder = match CandleEmbedder::load(&embedder_config) {
        Ok(embedder) => Arc::new(embedder),
        Err(err) => {
            tracing::error!(error = %err, "failed to load local embedding model, cannot continue");
            return Err(Box::new(err));
        }
    };
    let embedding_cache = Arc::new(EmbeddingCache::new(EMBEDDING_CACHE_CAPACITY));

    let qdrant = qdrant_client::Qdrant::from_url(&config.infra.vector_index.endpoint).build()?;
    let index: Arc<dyn VectorIndex> = Arc::new(QdrantIndex::new(qdrant, config.infra.vector_index.collection.clone()));
    let retriever: Arc<dyn RetrieverTrait> = Arc::new(HybridRetriever::new(index));

    let rerank_provider: Box<dyn pipeline_rag::RerankProvider> = if config.infra.rerank.enabled {
        let endpoint = config.infra.rerank.endpoint.clone().unwrap_or_default();
        Box::new(HttpRerankProvider::new(endpoint, config.infra.rerank.api_key.clone()))
    } else {
        Box::new(KeywordOverlapProvider)
    };
    let reranker = Arc::new(RerankerClient::new(rerank_provider, config.timeouts.rerank()));

    let backend_a: Arc<dyn pipeline_core::LanguageModel> =
        Arc::new(HttpChatBackend::new(backend_config(&config.infra.backend_a))?);
    let backend_b: Arc<dyn pipeline_core::LanguageModel> =
        Arc::new(HttpChatBackend::new(backend_config(&config.infra.backend_b))?);
    let router = Arc::new(ModelRouter::new(Arc::clone(&backend_a), Arc::clone(&backend_b), config.runtime.force_backend_a));

    let translator: Option<Arc<dyn pipeline_core::Translator>> = Some(Arc::new(LlmTranslator::new(Arc::clone(&backend_a))));

    let classifier = Arc::new(Classifier::new(Arc::clone(&backend_a), translator.clone(), Arc::clone(&prompts)));
    let generator = Arc::new(ResponseGenerator::new(Arc::clone(&prompts), translator));
    let faithfulness = Arc::new(FaithfulnessGuard::new(config.runtime.faithfulness_threshold, config.runtime.faithfulness_low_threshold));

    let web_search: Option<Arc<dyn WebSearchProvider>> = if config.infra.web_search.enabled {
        let endpoint = config.infra.web_search.endpoint.clone().unwrap_or_default();
        Some(Arc::new(HttpWebSearchProvider::new(endpoint, config.infra.web_search.api_key.clone())))
    } else {
        None
    };

    Ok(Orchestrator::new(
        Arc::new(config.clone()),
        prompts,
        cache,
        embedder,
        embedding_cache,
        retriever,
        reranker,
        classifier,
        router,
        generator,
        faithfulness,
        web_search,
    ))
}

fn backend_config(cfg: &pipeline_config::LlmBackendConfig) -> BackendConfig {
    let mut backend = BackendConfig::new(cfg.model.clone(), cfg.endpoint.clone());
    if let Some(key) = &cfg.api_key {
        backend = backend.with_api_key(key.clone());
    }
    backend
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "pipeline_server=info,tower_http=info".into());
    let fmt_layer = tracing_subscriber::fmt::layer().boxed();
    tracing_subscriber::registry().with(env_filter).with(fmt_layer).init();
}
