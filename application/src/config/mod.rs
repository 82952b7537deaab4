//! Application-level configuration.
//!
//! - [`EngineParams`]: engine tuning that is not part of a debate's own
//!   configuration (judge retries, token counting, event buffering)

pub mod engine_params;

pub use engine_params::EngineParams;
