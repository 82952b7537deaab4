//! Append-only debate history.

use super::assessment::JudgeAssessment;
use super::config::{DebatePhase, ParticipantSpec};
use crate::core::model::ModelId;
use crate::session::usage::TokenUsage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Author id of synthetic summary rounds.
pub const SUMMARY_AUTHOR: &str = "system";

/// Terminal status of one participant's turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Completed,
    Error,
    RateLimited,
    ContextExceeded,
    Timeout,
}

impl ResponseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseStatus::Completed => "completed",
            ResponseStatus::Error => "error",
            ResponseStatus::RateLimited => "rate_limited",
            ResponseStatus::ContextExceeded => "context_exceeded",
            ResponseStatus::Timeout => "timeout",
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, ResponseStatus::Completed)
    }
}

impl std::fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One participant's contribution to a round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantResponse {
    pub participant_id: String,
    pub display_name: String,
    pub model: ModelId,
    pub content: String,
    #[serde(default)]
    pub usage: TokenUsage,
    #[serde(default)]
    pub cost: f64,
    #[serde(default)]
    pub duration_ms: u64,
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub retryable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl ParticipantResponse {
    pub fn completed(
        participant: &ParticipantSpec,
        content: impl Into<String>,
        usage: TokenUsage,
        duration_ms: u64,
    ) -> Self {
        Self {
            participant_id: participant.id.clone(),
            display_name: participant.display_name.clone(),
            model: participant.model.clone(),
            content: content.into(),
            usage,
            cost: 0.0,
            duration_ms,
            status: ResponseStatus::Completed,
            error: None,
            retryable: false,
            retry_after_secs: None,
        }
    }

    pub fn failed(
        participant: &ParticipantSpec,
        status: ResponseStatus,
        message: impl Into<String>,
        retryable: bool,
        duration_ms: u64,
    ) -> Self {
        Self {
            participant_id: participant.id.clone(),
            display_name: participant.display_name.clone(),
            model: participant.model.clone(),
            content: String::new(),
            usage: TokenUsage::default(),
            cost: 0.0,
            duration_ms,
            status,
            error: Some(message.into()),
            retryable,
            retry_after_secs: None,
        }
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    pub fn with_retry_after(mut self, secs: Option<u64>) -> Self {
        self.retry_after_secs = secs;
        self
    }

    pub fn is_completed(&self) -> bool {
        self.status.is_completed()
    }
}

/// One discrete cycle of the debate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Round {
    pub number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<DebatePhase>,
    pub responses: Vec<ParticipantResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assessment: Option<JudgeAssessment>,
    /// Synthetic round produced by history summarization; never persisted.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_summary: bool,
    /// The round was cut short by a cost-limit breach.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub aborted: bool,
}

impl Round {
    pub fn new(number: u32, phase: Option<DebatePhase>, responses: Vec<ParticipantResponse>) -> Self {
        Self {
            number,
            phase,
            responses,
            assessment: None,
            is_summary: false,
            aborted: false,
        }
    }

    /// Synthetic summary round standing in for compressed earlier rounds.
    pub fn summary(text: impl Into<String>, model: ModelId) -> Self {
        let response = ParticipantResponse {
            participant_id: SUMMARY_AUTHOR.to_string(),
            display_name: "Summary".to_string(),
            model,
            content: text.into(),
            usage: TokenUsage::default(),
            cost: 0.0,
            duration_ms: 0,
            status: ResponseStatus::Completed,
            error: None,
            retryable: false,
            retry_after_secs: None,
        };
        Self {
            number: 0,
            phase: None,
            responses: vec![response],
            assessment: None,
            is_summary: true,
            aborted: false,
        }
    }

    pub fn with_assessment(mut self, assessment: JudgeAssessment) -> Self {
        self.assessment = Some(assessment);
        self
    }

    pub fn completed_responses(&self) -> impl Iterator<Item = &ParticipantResponse> {
        self.responses.iter().filter(|r| r.is_completed())
    }

    pub fn usage(&self) -> TokenUsage {
        self.responses.iter().map(|r| r.usage).sum()
    }

    pub fn cost(&self) -> f64 {
        self.responses.iter().map(|r| r.cost).sum()
    }

    /// The judge raised at least one flag on this round.
    pub fn is_flagged(&self) -> bool {
        self.assessment
            .as_ref()
            .is_some_and(|a| a.flags.any())
    }

    /// Plain-text rendering used in prompts and token estimation.
    pub fn render(&self) -> String {
        let mut out = if self.is_summary {
            "Summary of earlier rounds:\n".to_string()
        } else {
            match self.phase {
                Some(phase) => format!("Round {} ({}):\n", self.number, phase.display_name()),
                None => format!("Round {}:\n", self.number),
            }
        };
        for response in &self.responses {
            if self.is_summary {
                out.push_str(&response.content);
                out.push('\n');
            } else if response.is_completed() {
                out.push_str(&format!("[{}] {}\n", response.display_name, response.content));
            } else {
                out.push_str(&format!("[{}] (no response: {})\n", response.display_name, response.status));
            }
        }
        out
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HistoryError {
    #[error("Round {got} does not follow round {expected_after}")]
    NonSequentialRound { expected_after: u32, got: u32 },

    #[error("Summary rounds cannot be appended to the history")]
    SummaryRound,
}

/// Ordered, append-only list of rounds numbered 1, 2, 3, ...
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DebateHistory {
    rounds: Vec<Round>,
}

impl DebateHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a history, checking numbering.
    pub fn from_rounds(rounds: Vec<Round>) -> Result<Self, HistoryError> {
        let mut history = Self::new();
        for round in rounds {
            history.append(round)?;
        }
        Ok(history)
    }

    pub fn append(&mut self, round: Round) -> Result<(), HistoryError> {
        if round.is_summary {
            return Err(HistoryError::SummaryRound);
        }
        let last = self.last_number();
        if round.number != last + 1 {
            return Err(HistoryError::NonSequentialRound {
                expected_after: last,
                got: round.number,
            });
        }
        self.rounds.push(round);
        Ok(())
    }

    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    pub fn latest(&self) -> Option<&Round> {
        self.rounds.last()
    }

    pub fn last_number(&self) -> u32 {
        self.rounds.last().map(|r| r.number).unwrap_or(0)
    }

    pub fn next_round_number(&self) -> u32 {
        self.last_number() + 1
    }

    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    pub fn total_cost(&self) -> f64 {
        self.rounds.iter().map(Round::cost).sum()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Round> {
        self.rounds.iter()
    }
}

impl<'a> IntoIterator for &'a DebateHistory {
    type Item = &'a Round;
    type IntoIter = std::slice::Iter<'a, Round>;

    fn into_iter(self) -> Self::IntoIter {
        self.rounds.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ParticipantSpec {
        ParticipantSpec::new("pro", "model-a", "For").with_display_name("Pro")
    }

    #[test]
    fn test_append_requires_sequential_numbers() {
        let mut history = DebateHistory::new();
        history.append(Round::new(1, None, vec![])).unwrap();
        history.append(Round::new(2, None, vec![])).unwrap();
        assert_eq!(
            history.append(Round::new(4, None, vec![])),
            Err(HistoryError::NonSequentialRound {
                expected_after: 2,
                got: 4
            })
        );
        assert_eq!(
            history.append(Round::new(2, None, vec![])),
            Err(HistoryError::NonSequentialRound {
                expected_after: 2,
                got: 2
            })
        );
        let numbers: Vec<u32> = history.iter().map(|r| r.number).collect();
        assert_eq!(numbers, vec![1, 2]);
        assert_eq!(history.next_round_number(), 3);
    }

    #[test]
    fn test_first_round_must_be_one() {
        let mut history = DebateHistory::new();
        assert!(history.append(Round::new(0, None, vec![])).is_err());
        assert!(
            history
                .append(Round::summary("s", ModelId::from("j")))
                .is_err()
        );
    }

    #[test]
    fn test_render_marks_failures() {
        let round = Round::new(
            1,
            Some(DebatePhase::Opening),
            vec![
                ParticipantResponse::completed(&spec(), "Cars are bad.", TokenUsage::new(5, 3), 10),
                ParticipantResponse::failed(&spec(), ResponseStatus::Timeout, "slow", true, 90_000),
            ],
        );
        let text = round.render();
        assert!(text.starts_with("Round 1 (Opening Statements):"));
        assert!(text.contains("[Pro] Cars are bad."));
        assert!(text.contains("(no response: timeout)"));
        assert_eq!(round.completed_responses().count(), 1);
        assert_eq!(round.usage(), TokenUsage::new(5, 3));
    }

    #[test]
    fn test_from_rounds_and_cost() {
        let r1 = Round::new(
            1,
            None,
            vec![ParticipantResponse::completed(&spec(), "x", TokenUsage::default(), 1).with_cost(0.25)],
        );
        let r2 = Round::new(
            2,
            None,
            vec![ParticipantResponse::completed(&spec(), "y", TokenUsage::default(), 1).with_cost(0.5)],
        );
        let history = DebateHistory::from_rounds(vec![r1, r2]).unwrap();
        assert!((history.total_cost() - 0.75).abs() < 1e-9);
    }
}
