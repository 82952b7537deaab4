//! Infrastructure layer for quorum-debate
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer: configuration file loading, the
//! OpenAI-compatible gateway, debate persistence and the event log.

pub mod config;
pub mod logging;
pub mod persistence;
pub mod providers;

// Re-export commonly used types
pub use config::{ConfigLoader, FileConfig, FileOutputConfig, FileProviderConfig};
pub use logging::JsonlEventLog;
pub use persistence::{InMemoryDebateRepository, JsonlDebateRepository};
pub use providers::{OpenAiConfig, OpenAiGateway};
