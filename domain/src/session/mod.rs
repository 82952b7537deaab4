//! LLM invocation domain.
//!
//! - [`entities::Message`]: a single chat message
//! - [`entities::GenerationParams`]: per-invocation parameters
//! - [`stream::StreamEvent`]: incremental output of a streamed invocation
//! - [`usage::TokenUsage`]: prompt/completion token counts

pub mod entities;
pub mod stream;
pub mod usage;
