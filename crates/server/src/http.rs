//! HTTP endpoints (spec §6.1).

use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use pipeline_core::{Answer, Turn};
use pipeline_core::BACKEND_A_LANGS;
use pipeline_orchestrator::Query;

use crate::state::AppState;
use crate::ServerError;

/// Languages that route to Backend-B (spec §4.10's "all other languages");
/// no vendor SDK or spec section bounds this set, so it is listed the way
/// `BACKEND_A_LANGS` is: a representative table, not an exhaustive one.
const BACKEND_B_LANGS: &[&str] = &["hi", "fr", "zh", "ar", "bn", "ur", "ta", "vi", "ko", "ja", "sw", "tl"];

pub fn create_router(state: AppState) -> Router {
    let cors_layer = build_cors_layer(&state.config.server.cors_origins, state.config.server.cors_enabled);

    Router::new()
        .route("/api/v1/chat/query", post(chat_query))
        .route("/api/v1/languages/supported", get(languages_supported))
        .route("/api/v1/feedback/submit", post(feedback_submit))
        .route("/health", get(health))
        .route("/health/ready", get(health_ready))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

/// Builds the CORS layer from `ServerConfig`'s configured origins.
/// Disabled is permissive (development only); no origins configured
/// falls back to `localhost:3000`; otherwise only the configured
/// origins are allowed, with credentials.
fn build_cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    if !enabled {
        tracing::warn!("CORS is disabled - allowing all origins (not for production)");
        return CorsLayer::permissive();
    }

    if origins.is_empty() {
        tracing::info!("no CORS origins configured, defaulting to localhost:3000");
        return CorsLayer::new()
            .allow_origin("http://localhost:3000".parse::<HeaderValue>().unwrap())
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!(%origin, "invalid CORS origin, skipping");
                None
            })
        })
        .collect();

    if parsed.is_empty() {
        tracing::error!("all configured CORS origins are invalid, falling back to localhost");
        return CorsLayer::new()
            .allow_origin("http://localhost:3000".parse::<HeaderValue>().unwrap())
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(Any);
    }

    CorsLayer::new()
        .allow_origin(parsed)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
        .allow_credentials(true)
}

#[derive(Debug, Deserialize)]
struct ChatQueryRequest {
    query: String,
    language: String,
    #[serde(default)]
    conversation_history: Vec<Turn>,
    #[serde(default)]
    #[allow(dead_code)]
    stream: bool,
}

/// Response 200 shape of spec §6.1. Distinct from `Answer` because the
/// wire field names (`response`, `processing_time` as seconds,
/// `model_used`/`retrieval_source` as lowercase strings) diverge from the
/// internal entity's field names and units.
#[derive(Debug, Serialize)]
struct ChatQueryResponse {
    success: bool,
    response: String,
    citations: Vec<pipeline_core::Citation>,
    faithfulness_score: f32,
    processing_time: f64,
    language_used: String,
    model_used: String,
    retrieval_source: String,
    request_id: String,
}

impl From<Answer> for ChatQueryResponse {
    fn from(answer: Answer) -> Self {
        Self {
            success: true,
            response: answer.text,
            citations: answer.citations,
            faithfulness_score: answer.faithfulness_score,
            processing_time: answer.processing_time_ms as f64 / 1000.0,
            language_used: answer.language_used,
            model_used: match answer.model_used {
                pipeline_core::ModelUsed::BackendA => "command_a".to_string(),
                pipeline_core::ModelUsed::BackendB => "nova".to_string(),
            },
            retrieval_source: match answer.retrieval_source {
                pipeline_core::RetrievalSource::Search => "search".to_string(),
                pipeline_core::RetrievalSource::Canned => "canned".to_string(),
                pipeline_core::RetrievalSource::FallbackWeb => "fallback-web".to_string(),
            },
            request_id: answer.request_id,
        }
    }
}

async fn chat_query(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<std::net::SocketAddr>,
    Json(request): Json<ChatQueryRequest>,
) -> Result<Json<ChatQueryResponse>, ServerError> {
    if !state.rate_limiter.check(&addr.ip().to_string()) {
        return Err(ServerError::RateLimited);
    }

    let request_id = uuid::Uuid::new_v4().to_string();
    let query = Query::new(request.query, request.language, request_id).with_history(request.conversation_history);

    let answer = state.orchestrator.process(query).await?;
    Ok(Json(answer.into()))
}

#[derive(Debug, Serialize)]
struct LanguagesSupportedResponse {
    command_a_languages: &'static [&'static str],
    nova_languages: &'static [&'static str],
    total_supported: usize,
}

async fn languages_supported() -> Json<LanguagesSupportedResponse> {
    Json(LanguagesSupportedResponse {
        command_a_languages: BACKEND_A_LANGS,
        nova_languages: BACKEND_B_LANGS,
        total_supported: BACKEND_A_LANGS.len() + BACKEND_B_LANGS.len(),
    })
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct FeedbackRequest {
    request_id: String,
    helpful: bool,
    #[serde(default)]
    comment: Option<String>,
}

/// Feedback capture is an external collaborator (spec §1); this crate
/// only accepts and acknowledges the submission rather than persisting
/// it anywhere.
async fn feedback_submit(Json(_request): Json<FeedbackRequest>) -> impl IntoResponse {
    (StatusCode::ACCEPTED, Json(serde_json::json!({ "success": true })))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy", "version": env!("CARGO_PKG_VERSION") }))
}

async fn health_ready(State(_state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ready" }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cors_disabled_is_permissive() {
        let _ = build_cors_layer(&[], false);
    }

    #[test]
    fn cors_defaults_to_localhost_when_unconfigured() {
        let _ = build_cors_layer(&[], true);
    }

    #[test]
    fn cors_uses_configured_origins() {
        let _ = build_cors_layer(&["https://example.com".to_string()], true);
    }
}
