//! Port for persisting debate history.
//!
//! The runner appends each finished round and the final verdict; a restart
//! reloads them to rebuild the debate.

use async_trait::async_trait;
use quorum_domain::{DebateHistory, DebateId, FinalVerdict, Round};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt history for debate {debate_id}: {message}")]
    Corrupt { debate_id: DebateId, message: String },

    #[error("Repository unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait DebateRepository: Send + Sync {
    async fn append_round(&self, debate_id: DebateId, round: &Round) -> Result<(), RepositoryError>;

    async fn append_verdict(
        &self,
        debate_id: DebateId,
        verdict: &FinalVerdict,
    ) -> Result<(), RepositoryError>;

    /// Rounds in order; empty for an unknown debate.
    async fn load_history(&self, debate_id: DebateId) -> Result<DebateHistory, RepositoryError>;

    async fn load_verdict(&self, debate_id: DebateId)
    -> Result<Option<FinalVerdict>, RepositoryError>;
}

/// No-op implementation for tests and when persistence is disabled.
pub struct NoRepository;

#[async_trait]
impl DebateRepository for NoRepository {
    async fn append_round(&self, _debate_id: DebateId, _round: &Round) -> Result<(), RepositoryError> {
        Ok(())
    }

    async fn append_verdict(
        &self,
        _debate_id: DebateId,
        _verdict: &FinalVerdict,
    ) -> Result<(), RepositoryError> {
        Ok(())
    }

    async fn load_history(&self, _debate_id: DebateId) -> Result<DebateHistory, RepositoryError> {
        Ok(DebateHistory::new())
    }

    async fn load_verdict(
        &self,
        _debate_id: DebateId,
    ) -> Result<Option<FinalVerdict>, RepositoryError> {
        Ok(None)
    }
}
