//! LLM provider adapters implementing the `LlmGateway` port

pub mod openai;

pub use openai::{OpenAiConfig, OpenAiGateway};
