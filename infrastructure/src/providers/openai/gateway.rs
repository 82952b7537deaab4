//! OpenAI-compatible chat completions gateway
//!
//! Works against any endpoint speaking the `/chat/completions` protocol
//! (OpenAI, Azure-style proxies, vLLM, llama.cpp server, Ollama).

use super::sse::{SseData, SseDecoder};
use super::types::{self, ChatChunk, ChatResponse};
use async_trait::async_trait;
use futures::StreamExt;
use quorum_application::ports::llm_gateway::{GatewayError, LlmGateway, LlmRequest, StreamHandle};
use quorum_domain::util::preview;
use quorum_domain::{Completion, ModelId, StreamEvent, TokenUsage};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

const STREAM_BUFFER: usize = 64;

/// Connection settings for [`OpenAiGateway`].
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub request_timeout: Duration,
    pub default_max_tokens: Option<u32>,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            request_timeout: Duration::from_secs(120),
            default_max_tokens: None,
        }
    }
}

pub struct OpenAiGateway {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiGateway {
    pub fn new(config: OpenAiConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| GatewayError::ConnectionError(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    async fn send(&self, request: &LlmRequest, stream: bool) -> Result<reqwest::Response, GatewayError> {
        let body = types::build_request(request, stream, self.config.default_max_tokens);

        debug!(
            model = %request.model,
            messages = request.messages.len(),
            stream,
            "Calling chat completions"
        );

        let mut builder = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| types::classify_transport(&e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let text = response.text().await.unwrap_or_default();
        let error = types::classify_status(status.as_u16(), retry_after.as_deref(), &text);
        warn!(model = %request.model, status = status.as_u16(), "Chat completion failed: {}", error);
        Err(error)
    }
}

#[async_trait]
impl LlmGateway for OpenAiGateway {
    async fn invoke(&self, request: &LlmRequest) -> Result<Completion, GatewayError> {
        let response = self.send(request, false).await?;
        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| types::classify_transport(&e))?;

        let usage = parsed.usage.map(TokenUsage::from).unwrap_or_default();
        Ok(Completion::new(parsed.text(), usage))
    }

    async fn invoke_streaming(&self, request: &LlmRequest) -> Result<StreamHandle, GatewayError> {
        let response = self.send(request, true).await?;
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let model = request.model.clone();

        tokio::spawn(relay_stream(response, tx, model));

        Ok(StreamHandle::new(rx))
    }
}

/// Forward SSE deltas to `tx`, then a single terminal event.
async fn relay_stream(response: reqwest::Response, tx: mpsc::Sender<StreamEvent>, model: ModelId) {
    let mut bytes = response.bytes_stream();
    let mut decoder = SseDecoder::new();
    let mut text = String::new();
    let mut usage = TokenUsage::default();
    let mut finished = false;

    while !finished {
        let payloads = match bytes.next().await {
            Some(Ok(chunk)) => decoder.push(&chunk),
            Some(Err(e)) => {
                let error = types::classify_transport(&e);
                let _ = tx.send(StreamEvent::Error(error.to_string())).await;
                return;
            }
            None => {
                finished = true;
                decoder.finish().into_iter().collect()
            }
        };

        for payload in payloads {
            let json = match payload {
                SseData::Done => {
                    finished = true;
                    break;
                }
                SseData::Json(json) => json,
            };
            let chunk: ChatChunk = match serde_json::from_str(&json) {
                Ok(chunk) => chunk,
                Err(e) => {
                    debug!(
                        model = %model,
                        "Skipping unparseable stream chunk {}: {}",
                        preview(&json, 80),
                        e
                    );
                    continue;
                }
            };
            if let Some(wire) = chunk.usage {
                usage = wire.into();
            }
            if let Some(delta) = chunk.delta_text() {
                text.push_str(delta);
                // Receiver dropped: the caller cancelled or timed out.
                if tx.send(StreamEvent::Delta(delta.to_string())).await.is_err() {
                    return;
                }
            }
        }
    }

    let _ = tx
        .send(StreamEvent::Completed(Completion::new(text, usage)))
        .await;
}
