//! Shared application state handed to every axum handler.

use std::sync::Arc;

use pipeline_config::PipelineConfig;
use pipeline_orchestrator::Orchestrator;

use crate::rate_limit::ClientRateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub config: Arc<PipelineConfig>,
    pub rate_limiter: Arc<ClientRateLimiter>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>, config: Arc<PipelineConfig>) -> Self {
        let rate_limiter = Arc::new(ClientRateLimiter::new(&config.rate_limit));
        Self { orchestrator, config, rate_limiter }
    }
}
