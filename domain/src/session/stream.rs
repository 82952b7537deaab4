//! Streaming events for LLM invocations.
//!
//! [`StreamEvent`] represents individual events in a streaming LLM response,
//! enabling real-time display of model output as it's generated.

use super::usage::TokenUsage;

/// Final payload of an invocation, streamed or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
}

impl Completion {
    pub fn new(text: impl Into<String>, usage: TokenUsage) -> Self {
        Self {
            text: text.into(),
            usage,
        }
    }
}

/// An event in a streaming LLM response.
///
/// Within one stream, `Delta` events arrive in order and are followed by
/// exactly one terminal `Completed` or `Error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A text chunk from the model.
    Delta(String),
    /// The complete response (signals stream end).
    Completed(Completion),
    /// An error that occurred during streaming.
    Error(String),
}
