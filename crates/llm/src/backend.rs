//! Generation backends (spec §4.10's "Backend-A"/"Backend-B").
//!
//! Grounded on the teacher's `llm/src/backend.rs` `OllamaBackend`: the same
//! HTTP-chat-completion shape, exponential-backoff retry loop and
//! retryable-error classification, generalized to implement
//! `pipeline_core::LanguageModel` (so the router/generator depend on the
//! trait, not a concrete backend) and renamed to the spec's own
//! Backend-A/Backend-B split rather than any concrete vendor.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use pipeline_core::{
    Error, FinishReason, GenerateRequest, GenerateResponse, LanguageModel, Message, Result, Role,
    StreamChunk, TokenUsage,
};

/// Connection and retry settings for an HTTP chat-completion backend.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub model: String,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub context_size: usize,
}

impl BackendConfig {
    pub fn new(model: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            endpoint: endpoint.into(),
            api_key: None,
            timeout: Duration::from_secs(30),
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            context_size: 8192,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

/// A generic HTTP-backed chat model implementing `LanguageModel`. Used for
/// both Backend-A (fast chat model) and Backend-B (multilingual chat model)
/// — they differ only in `BackendConfig`, not in code.
pub struct HttpChatBackend {
    client: Client,
    config: BackendConfig,
}

impl HttpChatBackend {
    pub fn new(config: BackendConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Llm(format!("failed to build http client: {e}")))?;

        Ok(Self { client, config })
    }

    fn endpoint_url(&self) -> String {
        format!("{}/v1/chat/completions", self.config.endpoint)
    }

    fn build_request(&self, request: &GenerateRequest, stream: bool) -> ChatRequest {
        ChatRequest {
            model: request.model.clone().unwrap_or_else(|| self.config.model.clone()),
            messages: request.messages.iter().map(ChatMessage::from).collect(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            top_p: request.top_p,
            stop: request.stop.clone(),
            stream,
        }
    }

    async fn execute(&self, body: &ChatRequest) -> Result<ChatResponse> {
        let mut req = self.client.post(self.endpoint_url()).json(body);
        if let Some(key) = &self.config.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(|e| Error::Llm(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            if status.is_server_error() {
                return Err(Error::Llm(format!("server error {status}: {body}")));
            }
            return Err(Error::Llm(format!("api error {status}: {body}")));
        }

        response.json().await.map_err(|e| Error::Llm(format!("invalid response: {e}")))
    }

    fn is_retryable(err: &Error) -> bool {
        matches!(err, Error::Llm(msg) if msg.starts_with("request failed") || msg.starts_with("server error"))
    }
}

#[async_trait]
impl LanguageModel for HttpChatBackend {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse> {
        let body = self.build_request(&request, false);

        let mut backoff = self.config.initial_backoff;
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tracing::warn!(
                    dep = "llm_backend",
                    attempt,
                    max_retries = self.config.max_retries,
                    "retrying after backoff"
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }

            match self.execute(&body).await {
                Ok(resp) => {
                    let choice = resp.choices.into_iter().next();
                    let text = choice.as_ref().map(|c| c.message.content.clone()).unwrap_or_default();
                    let finish_reason = choice
                        .as_ref()
                        .and_then(|c| c.finish_reason.as_deref())
                        .map(map_finish_reason)
                        .unwrap_or_default();

                    return Ok(GenerateResponse {
                        text,
                        finish_reason,
                        usage: resp.usage.map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens)),
                    });
                }
                Err(e) if Self::is_retryable(&e) => last_error = Some(e),
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Llm("max retries exceeded".to_string())))
    }

    fn generate_stream<'a>(
        &'a self,
        request: GenerateRequest,
    ) -> Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send + 'a>> {
        let body = self.build_request(&request, true);

        Box::pin(async_stream::try_stream! {
            let mut req = self.client.post(self.endpoint_url()).json(&body);
            if let Some(key) = &self.config.api_key {
                req = req.bearer_auth(key);
            }

            let response = req
                .send()
                .await
                .map_err(|e| Error::Llm(format!("request failed: {e}")))?;

            if !response.status().is_success() {
                let text = response.text().await.unwrap_or_default();
                Err(Error::Llm(format!("api error: {text}")))?;
            }

            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|e| Error::Llm(format!("stream error: {e}")))?;
                let text = String::from_utf8_lossy(&chunk).into_owned();

                for line in text.lines() {
                    let Some(payload) = line.strip_prefix("data: ") else { continue };
                    if payload == "[DONE]" {
                        yield StreamChunk { delta: String::new(), is_final: true, finish_reason: Some(FinishReason::Stop) };
                        return;
                    }
                    if let Ok(parsed) = serde_json::from_str::<ChatStreamChunk>(payload) {
                        if let Some(choice) = parsed.choices.into_iter().next() {
                            let delta = choice.delta.content.unwrap_or_default();
                            let finish_reason = choice.finish_reason.as_deref().map(map_finish_reason);
                            yield StreamChunk {
                                delta,
                                is_final: finish_reason.is_some(),
                                finish_reason,
                            };
                        }
                    }
                }
            }
        })
    }

    async fn is_available(&self) -> bool {
        self.client
            .get(format!("{}/v1/models", self.config.endpoint))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn context_size(&self) -> usize {
        self.config.context_size
    }
}

fn map_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "stop" => FinishReason::Stop,
        "length" => FinishReason::Length,
        "content_filter" => FinishReason::ContentFilter,
        _ => FinishReason::Error,
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop: Vec<String>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

impl From<&Message> for ChatMessage {
    fn from(msg: &Message) -> Self {
        let role = match msg.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        Self { role: role.to_string(), content: msg.content.clone() }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatStreamChunk {
    choices: Vec<ChatStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatStreamChoice {
    delta: ChatStreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatStreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_have_retries() {
        let config = BackendConfig::new("backend-a-model", "http://localhost:8081");
        assert_eq!(config.max_retries, 3);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn with_api_key_sets_key() {
        let config = BackendConfig::new("m", "http://x").with_api_key("secret");
        assert_eq!(config.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn maps_finish_reasons() {
        assert_eq!(map_finish_reason("stop"), FinishReason::Stop);
        assert_eq!(map_finish_reason("length"), FinishReason::Length);
        assert_eq!(map_finish_reason("weird"), FinishReason::Error);
    }
}
