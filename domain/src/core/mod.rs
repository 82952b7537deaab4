//! Core domain concepts shared across all subdomains.
//!
//! - [`model::ModelId`]: identifier of a backing LLM model
//! - [`error::DomainError`]: configuration validation errors

pub mod error;
pub mod model;
