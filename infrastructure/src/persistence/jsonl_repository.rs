//! File-backed debate repository.
//!
//! Layout under the base directory:
//!
//! ```text
//! <debate-id>/rounds.jsonl   one Round per line, appended
//! <debate-id>/verdict.json   written once at the end
//! ```

use async_trait::async_trait;
use quorum_application::ports::repository::{DebateRepository, RepositoryError};
use quorum_domain::{DebateHistory, DebateId, FinalVerdict, Round};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

const ROUNDS_FILE: &str = "rounds.jsonl";
const VERDICT_FILE: &str = "verdict.json";

pub struct JsonlDebateRepository {
    base_path: PathBuf,
}

impl JsonlDebateRepository {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn debate_dir(&self, debate_id: DebateId) -> PathBuf {
        self.base_path.join(debate_id.to_string())
    }

    fn rounds_file(&self, debate_id: DebateId) -> PathBuf {
        self.debate_dir(debate_id).join(ROUNDS_FILE)
    }

    fn verdict_file(&self, debate_id: DebateId) -> PathBuf {
        self.debate_dir(debate_id).join(VERDICT_FILE)
    }

    /// Ids of every debate with a directory under the base path.
    pub async fn list_debates(&self) -> Result<Vec<DebateId>, RepositoryError> {
        let mut ids = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.base_path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ids),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if let Some(id) = entry.file_name().to_str().and_then(|n| n.parse().ok()) {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[async_trait]
impl DebateRepository for JsonlDebateRepository {
    async fn append_round(&self, debate_id: DebateId, round: &Round) -> Result<(), RepositoryError> {
        tokio::fs::create_dir_all(self.debate_dir(debate_id)).await?;

        let mut line = serde_json::to_string(round)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.rounds_file(debate_id))
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        debug!("Persisted round {} of debate {}", round.number, debate_id);
        Ok(())
    }

    async fn append_verdict(
        &self,
        debate_id: DebateId,
        verdict: &FinalVerdict,
    ) -> Result<(), RepositoryError> {
        tokio::fs::create_dir_all(self.debate_dir(debate_id)).await?;
        let json = serde_json::to_string_pretty(verdict)?;

        // Staged write: readers see either no verdict or the whole one.
        let target = self.verdict_file(debate_id);
        let staging = target.with_extension("json.tmp");
        tokio::fs::write(&staging, json).await?;
        tokio::fs::rename(&staging, &target).await?;

        debug!("Persisted verdict of debate {}", debate_id);
        Ok(())
    }

    async fn load_history(&self, debate_id: DebateId) -> Result<DebateHistory, RepositoryError> {
        let content = match tokio::fs::read_to_string(self.rounds_file(debate_id)).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(DebateHistory::new()),
            Err(e) => return Err(e.into()),
        };

        let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
        let mut history = DebateHistory::new();
        for (index, line) in lines.iter().enumerate() {
            let round: Round = match serde_json::from_str(line) {
                Ok(round) => round,
                // A torn final line is what an interrupted append leaves behind.
                Err(e) if index + 1 == lines.len() => {
                    warn!(
                        "Ignoring unreadable last line of debate {} history: {}",
                        debate_id, e
                    );
                    break;
                }
                Err(e) => {
                    return Err(RepositoryError::Corrupt {
                        debate_id,
                        message: format!("line {}: {}", index + 1, e),
                    });
                }
            };

            if round.number <= history.last_number() {
                warn!(
                    "Skipping duplicate round {} in debate {} history",
                    round.number, debate_id
                );
                continue;
            }
            history
                .append(round)
                .map_err(|e| RepositoryError::Corrupt {
                    debate_id,
                    message: format!("line {}: {}", index + 1, e),
                })?;
        }
        Ok(history)
    }

    async fn load_verdict(
        &self,
        debate_id: DebateId,
    ) -> Result<Option<FinalVerdict>, RepositoryError> {
        match tokio::fs::read_to_string(self.verdict_file(debate_id)).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorum_domain::{
        CostSnapshot, ParticipantResponse, ParticipantSpec, StopReason, TokenUsage,
    };
    use tempfile::TempDir;

    fn round(number: u32) -> Round {
        let spec = ParticipantSpec::new("pro", "gpt-4o", "Argue in favor");
        Round::new(
            number,
            None,
            vec![ParticipantResponse::completed(
                &spec,
                format!("Argument {}", number),
                TokenUsage::new(10, 20),
                5,
            )],
        )
    }

    #[tokio::test]
    async fn test_rounds_round_trip_in_order() {
        let dir = TempDir::new().unwrap();
        let repo = JsonlDebateRepository::new(dir.path());
        let id = DebateId::new();

        for n in 1..=3 {
            repo.append_round(id, &round(n)).await.unwrap();
        }

        let history = repo.load_history(id).await.unwrap();
        let numbers: Vec<u32> = history.iter().map(|r| r.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(history.rounds()[1].responses[0].content, "Argument 2");
        assert_eq!(repo.list_debates().await.unwrap(), vec![id]);
    }

    #[tokio::test]
    async fn test_unknown_debate_is_empty() {
        let dir = TempDir::new().unwrap();
        let repo = JsonlDebateRepository::new(dir.path().join("missing"));
        let id = DebateId::new();

        assert!(repo.load_history(id).await.unwrap().is_empty());
        assert!(repo.load_verdict(id).await.unwrap().is_none());
        assert!(repo.list_debates().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_verdict_round_trip() {
        let dir = TempDir::new().unwrap();
        let repo = JsonlDebateRepository::new(dir.path());
        let id = DebateId::new();
        let spec = ParticipantSpec::new("pro", "gpt-4o", "");
        let verdict = FinalVerdict::from_scores(
            &DebateHistory::new(),
            &[spec],
            StopReason::RoundLimit,
            CostSnapshot::default(),
        );

        repo.append_verdict(id, &verdict).await.unwrap();
        let loaded = repo.load_verdict(id).await.unwrap().unwrap();
        assert_eq!(loaded.stop_reason, StopReason::RoundLimit);
        assert!(!dir.path().join(id.to_string()).join("verdict.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_torn_last_line_and_duplicates_tolerated() {
        let dir = TempDir::new().unwrap();
        let repo = JsonlDebateRepository::new(dir.path());
        let id = DebateId::new();
        repo.append_round(id, &round(1)).await.unwrap();
        repo.append_round(id, &round(1)).await.unwrap();
        repo.append_round(id, &round(2)).await.unwrap();

        let path = dir.path().join(id.to_string()).join(ROUNDS_FILE);
        let mut content = std::fs::read_to_string(&path).unwrap();
        content.push_str("{\"number\": 3, \"respon");
        std::fs::write(&path, content).unwrap();

        let history = repo.load_history(id).await.unwrap();
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn test_gap_in_rounds_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let repo = JsonlDebateRepository::new(dir.path());
        let id = DebateId::new();
        repo.append_round(id, &round(1)).await.unwrap();
        repo.append_round(id, &round(3)).await.unwrap();
        repo.append_round(id, &round(4)).await.unwrap();

        assert!(matches!(
            repo.load_history(id).await,
            Err(RepositoryError::Corrupt { .. })
        ));
    }
}
