//! Application layer for quorum-debate
//!
//! This crate contains use cases, port definitions, and application configuration.
//! It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use config::EngineParams;
pub use ports::{
    event_sink::{EventSink, NoEventSink},
    llm_gateway::{GatewayError, LlmGateway, LlmRequest, StreamHandle},
    repository::{DebateRepository, NoRepository, RepositoryError},
};
pub use use_cases::debate_engine::{DebateEngine, EngineError};
pub use use_cases::debate_runner::DebateSnapshot;
pub use use_cases::event_stream::EventSubscription;
