//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod context_service;
pub mod debate_engine;
pub mod debate_runner;
pub mod event_stream;
pub mod judge_evaluator;
pub mod round_coordinator;

#[cfg(test)]
pub(crate) mod test_support;
