//! Context window management for debate history.
//!
//! - [`strategy::ContextSettings`]: budget and compression strategy
//! - [`estimate::estimate_tokens`]: character-based token estimate
//! - [`window::prepare_context`]: fit history into a budget

pub mod estimate;
pub mod strategy;
pub mod window;

pub use estimate::{TokenCounter, estimate_tokens};
pub use strategy::{CompressionStrategy, ContextSettings};
pub use window::{PreparedContext, importance_score, prepare_context, summarization_split};
