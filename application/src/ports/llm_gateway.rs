//! LLM Gateway port
//!
//! Defines the interface for invoking LLM providers.

use async_trait::async_trait;
use quorum_domain::{Completion, GenerationParams, Message, ModelId, ResponseStatus, StreamEvent};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Classified provider failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("Rate limited")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Context length exceeded: {0}")]
    ContextExceeded(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Timeout")]
    Timeout,

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Cancelled")]
    Cancelled,
}

impl GatewayError {
    /// Whether a later attempt could succeed without changing the request.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            GatewayError::ContextExceeded(_) | GatewayError::Authentication(_)
        )
    }

    /// Authentication failures stop the whole debate.
    pub fn is_fatal(&self) -> bool {
        matches!(self, GatewayError::Authentication(_))
    }

    pub fn response_status(&self) -> ResponseStatus {
        match self {
            GatewayError::RateLimited { .. } => ResponseStatus::RateLimited,
            GatewayError::ContextExceeded(_) => ResponseStatus::ContextExceeded,
            GatewayError::Timeout => ResponseStatus::Timeout,
            _ => ResponseStatus::Error,
        }
    }

    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            GatewayError::RateLimited { retry_after } => retry_after.map(|d| d.as_secs()),
            _ => None,
        }
    }
}

/// One model invocation
#[derive(Debug, Clone, PartialEq)]
pub struct LlmRequest {
    pub model: ModelId,
    pub messages: Vec<Message>,
    pub params: GenerationParams,
}

impl LlmRequest {
    pub fn new(model: ModelId, messages: Vec<Message>, params: GenerationParams) -> Self {
        Self {
            model,
            messages,
            params,
        }
    }
}

/// Gateway for LLM communication
///
/// This port defines how the application layer talks to LLM providers.
/// Implementations (adapters) live in the infrastructure layer.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    /// Invoke the model and wait for the full completion.
    async fn invoke(&self, request: &LlmRequest) -> Result<Completion, GatewayError>;

    /// Invoke the model with a streaming response.
    ///
    /// Default implementation calls `invoke()` and wraps the result in a
    /// single `Completed` event.
    async fn invoke_streaming(&self, request: &LlmRequest) -> Result<StreamHandle, GatewayError> {
        let completion = self.invoke(request).await?;
        let (tx, rx) = mpsc::channel(1);
        let _ = tx.send(StreamEvent::Completed(completion)).await;
        Ok(StreamHandle::new(rx))
    }

    /// Exact token count for `text` under `model`, when the provider offers one.
    async fn count_tokens(&self, _model: &ModelId, _text: &str) -> Option<usize> {
        None
    }
}

/// Handle for receiving streaming events from an invocation.
pub struct StreamHandle {
    pub receiver: mpsc::Receiver<StreamEvent>,
}

impl StreamHandle {
    pub fn new(receiver: mpsc::Receiver<StreamEvent>) -> Self {
        Self { receiver }
    }

    /// Consume the stream into a single completion.
    pub async fn collect(mut self) -> Result<Completion, GatewayError> {
        let mut text = String::new();
        while let Some(event) = self.receiver.recv().await {
            match event {
                StreamEvent::Delta(chunk) => text.push_str(&chunk),
                StreamEvent::Completed(mut completion) => {
                    if completion.text.is_empty() {
                        completion.text = text;
                    }
                    return Ok(completion);
                }
                StreamEvent::Error(e) => return Err(GatewayError::RequestFailed(e)),
            }
        }
        Err(GatewayError::ConnectionError(
            "stream closed before completion".into(),
        ))
    }
}
