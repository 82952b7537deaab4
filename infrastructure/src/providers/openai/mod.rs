//! OpenAI-compatible provider

mod gateway;
mod sse;
mod types;

pub use gateway::{OpenAiConfig, OpenAiGateway};
