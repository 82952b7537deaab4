//! Progress events published to subscribers of a debate.
//!
//! Every event carries a per-debate sequence number, strictly increasing
//! from 1, so a subscriber can resume after the last event it saw.

use crate::cost::ledger::{CostSnapshot, CostWarning};
use crate::debate::assessment::{FinalVerdict, JudgeAssessment};
use crate::debate::config::DebatePhase;
use crate::debate::guards::StopReason;
use crate::debate::history::ParticipantResponse;
use crate::debate::id::DebateId;
use crate::debate::lifecycle::DebateState;
use crate::session::usage::TokenUsage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Error taxonomy surfaced to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    ParticipantInvocation,
    Authentication,
    JudgeInvocation,
    JudgeOutputSchema,
    CostLimitBreach,
    Persistence,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation_error",
            ErrorKind::ParticipantInvocation => "participant_invocation_error",
            ErrorKind::Authentication => "authentication_error",
            ErrorKind::JudgeInvocation => "judge_invocation_error",
            ErrorKind::JudgeOutputSchema => "judge_output_schema_error",
            ErrorKind::CostLimitBreach => "cost_limit_breach",
            ErrorKind::Persistence => "persistence_error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    StateChanged {
        state: DebateState,
        round: u32,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        latest_responses: Vec<ParticipantResponse>,
        cost: CostSnapshot,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stop_reason: Option<StopReason>,
    },
    RoundStarted {
        round: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        phase: Option<DebatePhase>,
    },
    ParticipantChunk {
        round: u32,
        participant_id: String,
        chunk: String,
        done: bool,
    },
    ParticipantComplete {
        round: u32,
        response: ParticipantResponse,
        done: bool,
    },
    RoundComplete {
        round: u32,
        usage: TokenUsage,
        cost: f64,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        aborted: bool,
    },
    JudgeAssessment {
        round: u32,
        assessment: JudgeAssessment,
    },
    CostUpdate {
        cost: CostSnapshot,
    },
    CostWarning {
        warning: CostWarning,
    },
    VerdictReady {
        verdict: FinalVerdict,
    },
    Error {
        kind: ErrorKind,
        message: String,
        retryable: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        participant_id: Option<String>,
    },
}

impl EventKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            EventKind::StateChanged { .. } => "state_changed",
            EventKind::RoundStarted { .. } => "round_started",
            EventKind::ParticipantChunk { .. } => "participant_chunk",
            EventKind::ParticipantComplete { .. } => "participant_complete",
            EventKind::RoundComplete { .. } => "round_complete",
            EventKind::JudgeAssessment { .. } => "judge_assessment",
            EventKind::CostUpdate { .. } => "cost_update",
            EventKind::CostWarning { .. } => "cost_warning",
            EventKind::VerdictReady { .. } => "verdict_ready",
            EventKind::Error { .. } => "error",
        }
    }

    pub fn error(kind: ErrorKind, message: impl Into<String>, retryable: bool) -> Self {
        EventKind::Error {
            kind,
            message: message.into(),
            retryable,
            participant_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub sequence: u64,
    pub debate_id: DebateId,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl ProgressEvent {
    pub fn new(sequence: u64, debate_id: DebateId, kind: EventKind) -> Self {
        Self {
            sequence,
            debate_id,
            timestamp: Utc::now(),
            kind,
        }
    }

    /// A state change into `completed` or `error`; nothing follows until a
    /// retry.
    pub fn is_terminal(&self) -> bool {
        matches!(
            &self.kind,
            EventKind::StateChanged { state, .. } if state.is_terminal()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_with_type_tag() {
        let event = ProgressEvent::new(
            3,
            DebateId::new(),
            EventKind::ParticipantChunk {
                round: 1,
                participant_id: "pro".into(),
                chunk: "Hel".into(),
                done: false,
            },
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "participant_chunk");
        assert_eq!(json["sequence"], 3);
        assert_eq!(json["done"], false);
        let back: ProgressEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_terminal_detection() {
        let id = DebateId::new();
        let state = |state| EventKind::StateChanged {
            state,
            round: 2,
            latest_responses: vec![],
            cost: CostSnapshot::default(),
            stop_reason: None,
        };
        assert!(ProgressEvent::new(1, id, state(DebateState::Completed)).is_terminal());
        assert!(ProgressEvent::new(2, id, state(DebateState::Error)).is_terminal());
        assert!(!ProgressEvent::new(3, id, state(DebateState::Paused)).is_terminal());
        assert!(
            !ProgressEvent::new(4, id, EventKind::error(ErrorKind::Persistence, "disk", true))
                .is_terminal()
        );
    }
}
