//! Messages exchanged with an LLM

use serde::{Deserialize, Serialize};

/// Role of a message in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A message in a conversation (Entity)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Requested shape of the model's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    #[default]
    Text,
    /// Ask the provider for a JSON object (structured output).
    JsonObject,
}

/// Generation parameters for a single invocation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GenerationParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

impl GenerationParams {
    /// Parameters for debate turns.
    pub fn debate_turn() -> Self {
        Self {
            temperature: Some(0.7),
            max_tokens: Some(1_024),
            response_format: ResponseFormat::Text,
        }
    }

    /// Parameters for judge calls: low temperature, JSON output.
    pub fn structured() -> Self {
        Self {
            temperature: Some(0.0),
            max_tokens: Some(2_048),
            response_format: ResponseFormat::JsonObject,
        }
    }

    /// Parameters for history summarization.
    pub fn summary() -> Self {
        Self {
            temperature: Some(0.2),
            max_tokens: Some(1_024),
            response_format: ResponseFormat::Text,
        }
    }
}
