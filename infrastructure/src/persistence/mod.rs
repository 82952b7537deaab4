//! Debate persistence adapters.
//!
//! - [`JsonlDebateRepository`]: one directory per debate, rounds appended
//!   to `rounds.jsonl`, the verdict written to `verdict.json`
//! - [`InMemoryDebateRepository`]: process-local storage for runs that do
//!   not need to survive a restart

mod jsonl_repository;
mod memory_repository;

pub use jsonl_repository::JsonlDebateRepository;
pub use memory_repository::InMemoryDebateRepository;
