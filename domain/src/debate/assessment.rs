//! Judge output entities: per-round assessments and the final verdict.

use super::config::{ParticipantSpec, Rubric};
use super::guards::StopReason;
use super::history::DebateHistory;
use crate::cost::ledger::CostSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lead in average weighted score needed to name a winner without the judge.
pub const FALLBACK_WINNER_MARGIN: f64 = 0.5;

/// Stop-relevant observations raised by the judge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssessmentFlags {
    pub repetition_detected: bool,
    pub topic_drift: bool,
    pub convergence_reached: bool,
    pub diminishing_returns: bool,
}

impl AssessmentFlags {
    pub fn any(&self) -> bool {
        self.repetition_detected
            || self.topic_drift
            || self.convergence_reached
            || self.diminishing_returns
    }

    pub fn labels(&self) -> Vec<&'static str> {
        let mut labels = Vec::new();
        if self.repetition_detected {
            labels.push("repetition");
        }
        if self.topic_drift {
            labels.push("topic drift");
        }
        if self.convergence_reached {
            labels.push("convergence");
        }
        if self.diminishing_returns {
            labels.push("diminishing returns");
        }
        labels
    }
}

/// Rubric scores of one participant in one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantScore {
    pub participant_id: String,
    /// Criterion name → score in `0..=10`.
    pub criteria: BTreeMap<String, f64>,
    /// Computed from rubric weights, never taken from the model.
    pub weighted_total: f64,
}

impl ParticipantScore {
    pub fn new(participant_id: impl Into<String>, criteria: BTreeMap<String, f64>, rubric: &Rubric) -> Self {
        let weighted_total = rubric.weighted_total(&criteria);
        Self {
            participant_id: participant_id.into(),
            criteria,
            weighted_total,
        }
    }
}

/// The judge's evaluation of a single round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeAssessment {
    pub scores: Vec<ParticipantScore>,
    pub summary: String,
    pub should_continue: bool,
    #[serde(default)]
    pub flags: AssessmentFlags,
    /// Produced without the judge after repeated failures.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fallback: bool,
}

impl JudgeAssessment {
    /// Permissive default used when the judge is unavailable.
    pub fn fallback_default(reason: &str) -> Self {
        Self {
            scores: Vec::new(),
            summary: format!("Judge assessment unavailable: {}", reason),
            should_continue: true,
            flags: AssessmentFlags::default(),
            fallback: true,
        }
    }

    pub fn score_for(&self, participant_id: &str) -> Option<&ParticipantScore> {
        self.scores.iter().find(|s| s.participant_id == participant_id)
    }
}

/// Winner determination of the final verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VerdictOutcome {
    Winner {
        participant_id: String,
        justification: String,
    },
    NoWinner {
        justification: String,
    },
}

impl VerdictOutcome {
    pub fn winner(&self) -> Option<&str> {
        match self {
            VerdictOutcome::Winner { participant_id, .. } => Some(participant_id),
            VerdictOutcome::NoWinner { .. } => None,
        }
    }

    pub fn justification(&self) -> &str {
        match self {
            VerdictOutcome::Winner { justification, .. } => justification,
            VerdictOutcome::NoWinner { justification } => justification,
        }
    }
}

/// The judge's closing decision over the whole debate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalVerdict {
    pub summary: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub agreements: Vec<String>,
    #[serde(default)]
    pub disagreements: Vec<String>,
    pub outcome: VerdictOutcome,
    /// Cumulative weighted score per participant.
    #[serde(default)]
    pub participant_totals: BTreeMap<String, f64>,
    pub stop_reason: StopReason,
    #[serde(default)]
    pub cost: CostSnapshot,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fallback: bool,
}

impl FinalVerdict {
    /// Deterministic verdict built from accumulated round scores.
    ///
    /// The highest average weighted score wins if it leads the runner-up by
    /// at least [`FALLBACK_WINNER_MARGIN`]; otherwise there is no winner.
    pub fn from_scores(
        history: &DebateHistory,
        participants: &[ParticipantSpec],
        stop_reason: StopReason,
        cost: CostSnapshot,
    ) -> Self {
        let totals = cumulative_scores(history);
        let scored_rounds = history
            .iter()
            .filter(|r| r.assessment.as_ref().is_some_and(|a| !a.scores.is_empty()))
            .count()
            .max(1) as f64;

        let mut ranking: Vec<(&str, f64)> = participants
            .iter()
            .map(|p| {
                let total = totals.get(&p.id).copied().unwrap_or(0.0);
                (p.id.as_str(), total / scored_rounds)
            })
            .collect();
        ranking.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let outcome = match ranking.as_slice() {
            [(leader, lead), (_, second), ..] if lead - second >= FALLBACK_WINNER_MARGIN => {
                VerdictOutcome::Winner {
                    participant_id: leader.to_string(),
                    justification: format!(
                        "Highest average weighted score ({:.2}), leading the runner-up by {:.2}",
                        lead,
                        lead - second
                    ),
                }
            }
            [_, _, ..] => VerdictOutcome::NoWinner {
                justification: format!(
                    "No participant led by at least {:.1} points on average",
                    FALLBACK_WINNER_MARGIN
                ),
            },
            _ => VerdictOutcome::NoWinner {
                justification: "Not enough scored participants".to_string(),
            },
        };

        let key_points = history
            .iter()
            .filter_map(|r| {
                r.assessment
                    .as_ref()
                    .filter(|a| !a.fallback && !a.summary.is_empty())
                    .map(|a| format!("Round {}: {}", r.number, a.summary))
            })
            .collect();

        Self {
            summary: format!(
                "Debate ended after {} round(s) ({}). Verdict derived from accumulated judge scores.",
                history.len(),
                stop_reason
            ),
            key_points,
            agreements: Vec::new(),
            disagreements: Vec::new(),
            outcome,
            participant_totals: totals,
            stop_reason,
            cost,
            created_at: Utc::now(),
            fallback: true,
        }
    }
}

/// Sum of weighted totals per participant across all assessed rounds.
pub fn cumulative_scores(history: &DebateHistory) -> BTreeMap<String, f64> {
    let mut totals = BTreeMap::new();
    for assessment in history.iter().filter_map(|r| r.assessment.as_ref()) {
        for score in &assessment.scores {
            *totals.entry(score.participant_id.clone()).or_insert(0.0) += score.weighted_total;
        }
    }
    totals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debate::history::Round;

    fn participants() -> Vec<ParticipantSpec> {
        vec![
            ParticipantSpec::new("pro", "a", "For"),
            ParticipantSpec::new("con", "b", "Against"),
        ]
    }

    fn scored(rubric: &Rubric, pro: f64, con: f64) -> JudgeAssessment {
        let all = |v: f64| rubric.criterion_names().map(|n| (n.to_string(), v)).collect();
        JudgeAssessment {
            scores: vec![
                ParticipantScore::new("pro", all(pro), rubric),
                ParticipantScore::new("con", all(con), rubric),
            ],
            summary: "ok".into(),
            should_continue: true,
            flags: AssessmentFlags::default(),
            fallback: false,
        }
    }

    fn history(pairs: &[(f64, f64)]) -> DebateHistory {
        let rubric = Rubric::default();
        let rounds = pairs
            .iter()
            .enumerate()
            .map(|(i, (pro, con))| {
                Round::new(i as u32 + 1, None, vec![]).with_assessment(scored(&rubric, *pro, *con))
            })
            .collect();
        DebateHistory::from_rounds(rounds).unwrap()
    }

    #[test]
    fn test_weighted_total_computed_from_rubric() {
        let rubric = Rubric::default();
        let score = ParticipantScore::new(
            "pro",
            BTreeMap::from([
                ("argument_quality".to_string(), 10.0),
                ("evidence".to_string(), 0.0),
                ("rebuttal".to_string(), 0.0),
                ("clarity".to_string(), 5.0),
            ]),
            &rubric,
        );
        assert!((score.weighted_total - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_cumulative_scores() {
        let totals = cumulative_scores(&history(&[(8.0, 6.0), (7.0, 7.0)]));
        assert!((totals["pro"] - 15.0).abs() < 1e-9);
        assert!((totals["con"] - 13.0).abs() < 1e-9);
    }

    #[test]
    fn test_fallback_verdict_names_clear_leader() {
        let verdict = FinalVerdict::from_scores(
            &history(&[(8.0, 6.0), (7.0, 7.0)]),
            &participants(),
            StopReason::RoundLimit,
            CostSnapshot::default(),
        );
        assert_eq!(verdict.outcome.winner(), Some("pro"));
        assert!(verdict.fallback);
        assert_eq!(verdict.key_points.len(), 2);
    }

    #[test]
    fn test_fallback_verdict_close_scores_no_winner() {
        let verdict = FinalVerdict::from_scores(
            &history(&[(7.2, 7.0)]),
            &participants(),
            StopReason::JudgeDecision,
            CostSnapshot::default(),
        );
        assert_eq!(verdict.outcome.winner(), None);
    }

    #[test]
    fn test_fallback_assessment_is_permissive() {
        let a = JudgeAssessment::fallback_default("timeout");
        assert!(a.should_continue);
        assert!(!a.flags.any());
        assert!(a.fallback);
    }

    #[test]
    fn test_outcome_serde_tagged() {
        let json = serde_json::to_value(VerdictOutcome::NoWinner {
            justification: "tie".into(),
        })
        .unwrap();
        assert_eq!(json["kind"], "no_winner");
    }
}
