//! Judge output parsing and schema validation.
//!
//! The judge is asked for a single JSON object. These functions extract it
//! (bare or inside a fenced code block), deserialize it into raw shapes and
//! validate it against the debate's participants and rubric. Any mismatch is
//! a [`JudgeSchemaError`], which callers treat as a retryable judge failure.
//!
//! Weighted totals are always recomputed from rubric weights.

use crate::cost::ledger::CostSnapshot;
use crate::debate::assessment::{
    AssessmentFlags, FinalVerdict, JudgeAssessment, ParticipantScore, VerdictOutcome,
};
use crate::debate::config::Rubric;
use crate::debate::guards::StopReason;
use chrono::Utc;
use serde::Deserialize;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum JudgeSchemaError {
    #[error("No JSON object found in judge output")]
    NoJson,

    #[error("Malformed judge JSON: {0}")]
    Malformed(String),

    #[error("Judge did not score participant {0}")]
    MissingParticipant(String),

    #[error("Judge scored unknown participant {0}")]
    UnknownParticipant(String),

    #[error("Judge did not score {participant} on {criterion}")]
    MissingCriterion {
        participant: String,
        criterion: String,
    },

    #[error("Score {score} for {participant} on {criterion} is outside 0-10")]
    ScoreOutOfRange {
        participant: String,
        criterion: String,
        score: f64,
    },

    #[error("Judge named unknown winner {0}")]
    UnknownWinner(String),

    #[error("Required field is empty: {0}")]
    EmptyField(&'static str),
}

#[derive(Debug, Deserialize)]
struct RawScore {
    participant_id: String,
    criteria: BTreeMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct RawAssessment {
    scores: Vec<RawScore>,
    summary: String,
    should_continue: bool,
    #[serde(default)]
    flags: AssessmentFlags,
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    summary: String,
    #[serde(default)]
    key_points: Vec<String>,
    #[serde(default)]
    agreements: Vec<String>,
    #[serde(default)]
    disagreements: Vec<String>,
    #[serde(default)]
    winner: Option<String>,
    justification: String,
}

/// Extract the JSON object from a model response.
///
/// Prefers a ```` ```json ```` fenced block, then falls back to the span
/// between the first `{` and the last `}`.
pub fn extract_json(text: &str) -> Option<&str> {
    if let Some(start) = text.find("```json") {
        let body = &text[start + "```json".len()..];
        if let Some(end) = body.find("```") {
            let inner = body[..end].trim();
            if inner.starts_with('{') {
                return Some(inner);
            }
        }
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn deserialize<T: for<'de> Deserialize<'de>>(text: &str) -> Result<T, JudgeSchemaError> {
    let json = extract_json(text).ok_or(JudgeSchemaError::NoJson)?;
    serde_json::from_str(json).map_err(|e| JudgeSchemaError::Malformed(e.to_string()))
}

/// Parse and validate a round assessment.
///
/// Every id in `participant_ids` must be scored on every rubric criterion
/// with a value in `0..=10`. Criteria outside the rubric are dropped.
pub fn parse_round_assessment(
    text: &str,
    participant_ids: &[&str],
    rubric: &Rubric,
) -> Result<JudgeAssessment, JudgeSchemaError> {
    let raw: RawAssessment = deserialize(text)?;

    if raw.summary.trim().is_empty() {
        return Err(JudgeSchemaError::EmptyField("summary"));
    }

    for score in &raw.scores {
        if !participant_ids.contains(&score.participant_id.as_str()) {
            return Err(JudgeSchemaError::UnknownParticipant(score.participant_id.clone()));
        }
    }

    let mut scores = Vec::with_capacity(participant_ids.len());
    for id in participant_ids {
        let raw_score = raw
            .scores
            .iter()
            .find(|s| s.participant_id == *id)
            .ok_or_else(|| JudgeSchemaError::MissingParticipant(id.to_string()))?;

        let mut criteria = BTreeMap::new();
        for name in rubric.criterion_names() {
            let value = *raw_score.criteria.get(name).ok_or_else(|| {
                JudgeSchemaError::MissingCriterion {
                    participant: id.to_string(),
                    criterion: name.to_string(),
                }
            })?;
            if !(0.0..=10.0).contains(&value) {
                return Err(JudgeSchemaError::ScoreOutOfRange {
                    participant: id.to_string(),
                    criterion: name.to_string(),
                    score: value,
                });
            }
            criteria.insert(name.to_string(), value);
        }
        scores.push(ParticipantScore::new(*id, criteria, rubric));
    }

    Ok(JudgeAssessment {
        scores,
        summary: raw.summary.trim().to_string(),
        should_continue: raw.should_continue,
        flags: raw.flags,
        fallback: false,
    })
}

/// A validated verdict before debate-level data is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct VerdictDraft {
    pub summary: String,
    pub key_points: Vec<String>,
    pub agreements: Vec<String>,
    pub disagreements: Vec<String>,
    pub outcome: VerdictOutcome,
}

impl VerdictDraft {
    pub fn into_verdict(
        self,
        participant_totals: BTreeMap<String, f64>,
        stop_reason: StopReason,
        cost: CostSnapshot,
    ) -> FinalVerdict {
        FinalVerdict {
            summary: self.summary,
            key_points: self.key_points,
            agreements: self.agreements,
            disagreements: self.disagreements,
            outcome: self.outcome,
            participant_totals,
            stop_reason,
            cost,
            created_at: Utc::now(),
            fallback: false,
        }
    }
}

/// Parse and validate the final verdict.
///
/// `winner` may be a participant id, `null`, or an empty/"none" string for
/// an explicit no-winner outcome.
pub fn parse_final_verdict(
    text: &str,
    participant_ids: &[&str],
) -> Result<VerdictDraft, JudgeSchemaError> {
    let raw: RawVerdict = deserialize(text)?;

    if raw.summary.trim().is_empty() {
        return Err(JudgeSchemaError::EmptyField("summary"));
    }
    if raw.justification.trim().is_empty() {
        return Err(JudgeSchemaError::EmptyField("justification"));
    }

    let winner = raw
        .winner
        .map(|w| w.trim().to_string())
        .filter(|w| !w.is_empty() && !w.eq_ignore_ascii_case("none") && !w.eq_ignore_ascii_case("null"));

    let outcome = match winner {
        Some(id) if participant_ids.contains(&id.as_str()) => VerdictOutcome::Winner {
            participant_id: id,
            justification: raw.justification.trim().to_string(),
        },
        Some(id) => return Err(JudgeSchemaError::UnknownWinner(id)),
        None => VerdictOutcome::NoWinner {
            justification: raw.justification.trim().to_string(),
        },
    };

    Ok(VerdictDraft {
        summary: raw.summary.trim().to_string(),
        key_points: raw.key_points,
        agreements: raw.agreements,
        disagreements: raw.disagreements,
        outcome,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debate::config::Criterion;

    fn rubric() -> Rubric {
        Rubric::new(vec![Criterion::new("logic", 0.6), Criterion::new("clarity", 0.4)])
    }

    const IDS: &[&str] = &["pro", "con"];

    #[test]
    fn test_extract_json_fenced_and_bare() {
        let fenced = "Here you go:\n```json\n{\"a\": 1}\n```\nthanks";
        assert_eq!(extract_json(fenced), Some("{\"a\": 1}"));
        assert_eq!(extract_json("prefix {\"b\": {\"c\": 2}} suffix"), Some("{\"b\": {\"c\": 2}}"));
        assert_eq!(extract_json("no json"), None);
    }

    #[test]
    fn test_parse_valid_assessment_recomputes_totals() {
        let text = r#"```json
{
  "scores": [
    {"participant_id": "pro", "criteria": {"logic": 8, "clarity": 6, "style": 9}, "weighted_total": 99},
    {"participant_id": "con", "criteria": {"logic": 5, "clarity": 10}}
  ],
  "summary": "Pro argued more rigorously.",
  "should_continue": true,
  "flags": {"topic_drift": true}
}
```"#;
        let a = parse_round_assessment(text, IDS, &rubric()).unwrap();
        let pro = a.score_for("pro").unwrap();
        assert!((pro.weighted_total - 7.2).abs() < 1e-9);
        assert!(!pro.criteria.contains_key("style"));
        assert!((a.score_for("con").unwrap().weighted_total - 7.0).abs() < 1e-9);
        assert!(a.flags.topic_drift);
        assert!(!a.flags.repetition_detected);
        assert!(!a.fallback);
    }

    #[test]
    fn test_missing_participant_rejected() {
        let text = r#"{"scores": [{"participant_id": "pro", "criteria": {"logic": 8, "clarity": 6}}],
                       "summary": "s", "should_continue": true}"#;
        assert_eq!(
            parse_round_assessment(text, IDS, &rubric()),
            Err(JudgeSchemaError::MissingParticipant("con".into()))
        );
    }

    #[test]
    fn test_missing_criterion_rejected() {
        let text = r#"{"scores": [
            {"participant_id": "pro", "criteria": {"logic": 8}},
            {"participant_id": "con", "criteria": {"logic": 8, "clarity": 1}}],
            "summary": "s", "should_continue": true}"#;
        assert!(matches!(
            parse_round_assessment(text, IDS, &rubric()),
            Err(JudgeSchemaError::MissingCriterion { .. })
        ));
    }

    #[test]
    fn test_out_of_range_rejected() {
        let text = r#"{"scores": [
            {"participant_id": "pro", "criteria": {"logic": 11, "clarity": 6}},
            {"participant_id": "con", "criteria": {"logic": 8, "clarity": 1}}],
            "summary": "s", "should_continue": true}"#;
        assert!(matches!(
            parse_round_assessment(text, IDS, &rubric()),
            Err(JudgeSchemaError::ScoreOutOfRange { .. })
        ));
    }

    #[test]
    fn test_malformed_and_missing_fields() {
        assert_eq!(
            parse_round_assessment("I think pro won.", IDS, &rubric()),
            Err(JudgeSchemaError::NoJson)
        );
        assert!(matches!(
            parse_round_assessment(r#"{"scores": [], "summary": "s"}"#, IDS, &rubric()),
            Err(JudgeSchemaError::Malformed(_))
        ));
    }

    #[test]
    fn test_unknown_participant_rejected() {
        let text = r#"{"scores": [
            {"participant_id": "pro", "criteria": {"logic": 1, "clarity": 1}},
            {"participant_id": "con", "criteria": {"logic": 1, "clarity": 1}},
            {"participant_id": "ghost", "criteria": {"logic": 1, "clarity": 1}}],
            "summary": "s", "should_continue": false}"#;
        assert_eq!(
            parse_round_assessment(text, IDS, &rubric()),
            Err(JudgeSchemaError::UnknownParticipant("ghost".into()))
        );
    }

    #[test]
    fn test_parse_verdict_winner_and_no_winner() {
        let text = r#"{"summary": "Close debate.", "key_points": ["a"], "agreements": [],
                       "disagreements": ["b"], "winner": "pro", "justification": "Higher scores"}"#;
        let draft = parse_final_verdict(text, IDS).unwrap();
        assert_eq!(draft.outcome.winner(), Some("pro"));

        let text = r#"{"summary": "Tie.", "winner": null, "justification": "Even"}"#;
        let draft = parse_final_verdict(text, IDS).unwrap();
        assert_eq!(draft.outcome.winner(), None);

        let text = r#"{"summary": "Tie.", "winner": "none", "justification": "Even"}"#;
        assert_eq!(parse_final_verdict(text, IDS).unwrap().outcome.winner(), None);
    }

    #[test]
    fn test_parse_verdict_unknown_winner() {
        let text = r#"{"summary": "x", "winner": "judge", "justification": "y"}"#;
        assert_eq!(
            parse_final_verdict(text, IDS),
            Err(JudgeSchemaError::UnknownWinner("judge".into()))
        );
    }
}
