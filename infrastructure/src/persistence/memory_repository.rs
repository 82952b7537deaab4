//! Process-local debate repository.

use async_trait::async_trait;
use quorum_application::ports::repository::{DebateRepository, RepositoryError};
use quorum_domain::{DebateHistory, DebateId, FinalVerdict, Round};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct Stored {
    history: DebateHistory,
    verdict: Option<FinalVerdict>,
}

/// Keeps every debate in memory; appends are validated like the history
/// itself, so out-of-order rounds are rejected.
#[derive(Default)]
pub struct InMemoryDebateRepository {
    debates: Mutex<HashMap<DebateId, Stored>>,
}

impl InMemoryDebateRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn debate_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<DebateId, Stored>> {
        self.debates.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl DebateRepository for InMemoryDebateRepository {
    async fn append_round(&self, debate_id: DebateId, round: &Round) -> Result<(), RepositoryError> {
        self.lock()
            .entry(debate_id)
            .or_default()
            .history
            .append(round.clone())
            .map_err(|e| RepositoryError::Corrupt {
                debate_id,
                message: e.to_string(),
            })
    }

    async fn append_verdict(
        &self,
        debate_id: DebateId,
        verdict: &FinalVerdict,
    ) -> Result<(), RepositoryError> {
        self.lock().entry(debate_id).or_default().verdict = Some(verdict.clone());
        Ok(())
    }

    async fn load_history(&self, debate_id: DebateId) -> Result<DebateHistory, RepositoryError> {
        Ok(self
            .lock()
            .get(&debate_id)
            .map(|s| s.history.clone())
            .unwrap_or_default())
    }

    async fn load_verdict(
        &self,
        debate_id: DebateId,
    ) -> Result<Option<FinalVerdict>, RepositoryError> {
        Ok(self.lock().get(&debate_id).and_then(|s| s.verdict.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_and_load() {
        let repo = InMemoryDebateRepository::new();
        let id = DebateId::new();

        repo.append_round(id, &Round::new(1, None, vec![])).await.unwrap();
        repo.append_round(id, &Round::new(2, None, vec![])).await.unwrap();

        assert_eq!(repo.load_history(id).await.unwrap().len(), 2);
        assert!(repo.load_verdict(id).await.unwrap().is_none());
        assert_eq!(repo.debate_count(), 1);
    }

    #[tokio::test]
    async fn test_out_of_order_round_rejected() {
        let repo = InMemoryDebateRepository::new();
        let id = DebateId::new();

        let result = repo.append_round(id, &Round::new(2, None, vec![])).await;
        assert!(matches!(result, Err(RepositoryError::Corrupt { .. })));
        assert!(repo.load_history(id).await.unwrap().is_empty());
    }
}
