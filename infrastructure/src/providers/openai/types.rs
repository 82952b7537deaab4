//! Wire types for the OpenAI-compatible chat completions API
//!
//! Converts domain messages and generation parameters into request bodies,
//! and classifies HTTP failures into [`GatewayError`]s.

use quorum_application::ports::llm_gateway::{GatewayError, LlmRequest};
use quorum_domain::{Message, ResponseFormat, Role, TokenUsage};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ─── Domain → Wire ───────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage<'a>>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<WireResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<StreamOptions>,
}

#[derive(Debug, Serialize)]
pub struct ChatMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

#[derive(Debug, Serialize)]
pub struct WireResponseFormat {
    #[serde(rename = "type")]
    pub kind: &'static str,
}

#[derive(Debug, Serialize)]
pub struct StreamOptions {
    pub include_usage: bool,
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

fn convert_message(message: &Message) -> ChatMessage<'_> {
    ChatMessage {
        role: role_name(message.role),
        content: &message.content,
    }
}

/// Build the request body. `default_max_tokens` applies when the request
/// leaves the completion length open.
pub fn build_request(
    request: &LlmRequest,
    stream: bool,
    default_max_tokens: Option<u32>,
) -> ChatRequest<'_> {
    let response_format = match request.params.response_format {
        ResponseFormat::Text => None,
        ResponseFormat::JsonObject => Some(WireResponseFormat {
            kind: "json_object",
        }),
    };

    ChatRequest {
        model: request.model.as_str(),
        messages: request.messages.iter().map(convert_message).collect(),
        stream,
        temperature: request.params.temperature,
        max_tokens: request.params.max_tokens.or(default_max_tokens),
        response_format,
        stream_options: stream.then_some(StreamOptions {
            include_usage: true,
        }),
    }
}

// ─── Wire → Domain ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ResponseChoice>,
    pub usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseChoice {
    pub message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    pub usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct WireUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
}

impl From<WireUsage> for TokenUsage {
    fn from(usage: WireUsage) -> Self {
        TokenUsage::new(usage.prompt_tokens, usage.completion_tokens)
    }
}

impl ChatResponse {
    pub fn text(&self) -> String {
        self.choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .unwrap_or_default()
    }
}

impl ChatChunk {
    pub fn delta_text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.delta.content.as_deref())
            .filter(|text| !text.is_empty())
    }
}

// ─── Error classification ────────────────────────────────────────

const CONTEXT_MARKERS: [&str; 4] = [
    "context_length_exceeded",
    "context length",
    "maximum context",
    "too many tokens",
];

/// Map a non-success HTTP response onto a gateway error.
pub fn classify_status(status: u16, retry_after: Option<&str>, body: &str) -> GatewayError {
    let detail = error_message(body);
    match status {
        429 => GatewayError::RateLimited {
            retry_after: retry_after.and_then(parse_retry_after),
        },
        401 | 403 => GatewayError::Authentication(detail),
        400 | 413 if mentions_context_length(body) => GatewayError::ContextExceeded(detail),
        408 | 504 => GatewayError::Timeout,
        _ => GatewayError::RequestFailed(format!("HTTP {}: {}", status, detail)),
    }
}

/// Map a transport failure onto a gateway error.
pub fn classify_transport(error: &reqwest::Error) -> GatewayError {
    if error.is_timeout() {
        GatewayError::Timeout
    } else if error.is_connect() {
        GatewayError::ConnectionError(error.to_string())
    } else {
        GatewayError::RequestFailed(error.to_string())
    }
}

fn mentions_context_length(body: &str) -> bool {
    let lower = body.to_lowercase();
    CONTEXT_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// `Retry-After` in delta-seconds; fractional values round up.
fn parse_retry_after(value: &str) -> Option<Duration> {
    let secs: f64 = value.trim().parse().ok()?;
    (secs.is_finite() && secs >= 0.0).then(|| Duration::from_secs(secs.ceil() as u64))
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// `error.message` from an OpenAI-style error body, else the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}
