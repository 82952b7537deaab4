//! Debate setup from TOML (`[debate]`, `[[participants]]` and `[judge]` sections)

use quorum_domain::{
    ConfigIssue, ConfigIssueCode, Criterion, DebateFormat, DebatePhase, ExecutionMode, JudgeSpec,
    ParticipantSpec, Rubric, SpeakingOrder, StopSensitivity,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw debate configuration from TOML
///
/// # Example
///
/// ```toml
/// [debate]
/// topic = "Should cities ban cars from downtown?"
/// format = "structured-rounds"    # free-form, structured-rounds, round-limited, convergence-seeking
/// mode = "sequential"             # simultaneous or sequential
/// speaking_order = "rotating"     # fixed or rotating
/// phases = ["opening", "rebuttal", "closing"]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileDebateConfig {
    pub topic: Option<String>,
    pub format: String,
    pub mode: String,
    pub speaking_order: String,
    pub phases: Option<Vec<String>>,
}

impl Default for FileDebateConfig {
    fn default() -> Self {
        Self {
            topic: None,
            format: "free-form".to_string(),
            mode: "simultaneous".to_string(),
            speaking_order: "fixed".to_string(),
            phases: None,
        }
    }
}

impl FileDebateConfig {
    pub fn parse_format(&self) -> (DebateFormat, Vec<ConfigIssue>) {
        match self.format.parse::<DebateFormat>() {
            Ok(format) => (format, vec![]),
            Err(e) => (
                DebateFormat::default(),
                vec![ConfigIssue::warning(
                    ConfigIssueCode::UnknownValue,
                    format!("debate.format: {}; falling back to 'free-form'", e),
                )],
            ),
        }
    }

    pub fn parse_mode(&self) -> (ExecutionMode, Vec<ConfigIssue>) {
        match self.mode.parse::<ExecutionMode>() {
            Ok(mode) => (mode, vec![]),
            Err(e) => (
                ExecutionMode::default(),
                vec![ConfigIssue::warning(
                    ConfigIssueCode::UnknownValue,
                    format!("debate.mode: {}; falling back to 'simultaneous'", e),
                )],
            ),
        }
    }

    pub fn parse_speaking_order(&self) -> (SpeakingOrder, Vec<ConfigIssue>) {
        match self.speaking_order.to_lowercase().as_str() {
            "fixed" => (SpeakingOrder::Fixed, vec![]),
            "rotating" | "rotate" => (SpeakingOrder::Rotating, vec![]),
            other => (
                SpeakingOrder::default(),
                vec![ConfigIssue::warning(
                    ConfigIssueCode::UnknownValue,
                    format!(
                        "debate.speaking_order: unknown value '{}', falling back to 'fixed'",
                        other
                    ),
                )],
            ),
        }
    }

    /// Unknown phase names are dropped; an empty result falls back to the
    /// default sequence.
    pub fn parse_phases(&self) -> (Vec<DebatePhase>, Vec<ConfigIssue>) {
        let Some(names) = &self.phases else {
            return (DebatePhase::default_sequence(), vec![]);
        };

        let mut issues = Vec::new();
        let phases: Vec<DebatePhase> = names
            .iter()
            .filter_map(|name| match parse_phase(name) {
                Some(phase) => Some(phase),
                None => {
                    issues.push(ConfigIssue::warning(
                        ConfigIssueCode::UnknownValue,
                        format!(
                            "debate.phases: unknown phase '{}'. Valid: opening, rebuttal, cross_examination, closing",
                            name
                        ),
                    ));
                    None
                }
            })
            .collect();

        if phases.is_empty() {
            (DebatePhase::default_sequence(), issues)
        } else {
            (phases, issues)
        }
    }
}

fn parse_phase(name: &str) -> Option<DebatePhase> {
    match name.to_lowercase().replace('-', "_").as_str() {
        "opening" => Some(DebatePhase::Opening),
        "rebuttal" => Some(DebatePhase::Rebuttal),
        "cross_examination" | "cross" => Some(DebatePhase::CrossExamination),
        "closing" => Some(DebatePhase::Closing),
        _ => None,
    }
}

/// One `[[participants]]` entry.
///
/// ```toml
/// [[participants]]
/// id = "pro"
/// name = "Alice"
/// model = "gpt-4.1"
/// persona = "Argue in favor of the motion"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileParticipantConfig {
    pub id: String,
    pub name: Option<String>,
    pub model: String,
    pub persona: String,
    pub system_prompt: Option<String>,
}

impl FileParticipantConfig {
    /// `None` with an error issue when `id` or `model` is missing.
    pub fn to_spec(&self, index: usize) -> (Option<ParticipantSpec>, Vec<ConfigIssue>) {
        if self.id.trim().is_empty() || self.model.trim().is_empty() {
            let issue = ConfigIssue::error(
                ConfigIssueCode::InvalidParticipant,
                format!("participants[{}]: both 'id' and 'model' are required", index),
            );
            return (None, vec![issue]);
        }

        let mut spec = ParticipantSpec::new(self.id.trim(), self.model.trim(), self.persona.clone());
        if let Some(name) = self.name.as_deref().filter(|n| !n.trim().is_empty()) {
            spec = spec.with_display_name(name.trim());
        }
        if let Some(prompt) = &self.system_prompt {
            spec = spec.with_system_prompt(prompt.clone());
        }
        (Some(spec), vec![])
    }
}

/// Raw judge configuration from TOML
///
/// ```toml
/// [judge]
/// model = "claude-sonnet-4"
/// show_assessments = true
///
/// [judge.rubric]
/// argument_quality = 0.4
/// evidence = 0.3
/// clarity = 0.3
///
/// [judge.sensitivity]
/// repetition = 0.5
/// drift = 0.5
/// convergence = 0.8
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileJudgeConfig {
    pub model: Option<String>,
    /// Criterion name to weight. Empty means the default rubric.
    pub rubric: BTreeMap<String, f64>,
    pub sensitivity: StopSensitivity,
    pub show_assessments: bool,
}

impl Default for FileJudgeConfig {
    fn default() -> Self {
        Self {
            model: None,
            rubric: BTreeMap::new(),
            sensitivity: StopSensitivity::default(),
            show_assessments: true,
        }
    }
}

impl FileJudgeConfig {
    pub fn to_spec(&self) -> (Option<JudgeSpec>, Vec<ConfigIssue>) {
        let Some(model) = self.model.as_deref().map(str::trim).filter(|m| !m.is_empty()) else {
            let issue = ConfigIssue::error(
                ConfigIssueCode::MissingJudge,
                "judge.model is required (set [judge] model or pass --judge)",
            );
            return (None, vec![issue]);
        };

        let rubric = if self.rubric.is_empty() {
            Rubric::default()
        } else {
            Rubric::new(
                self.rubric
                    .iter()
                    .map(|(name, weight)| Criterion::new(name.clone(), *weight))
                    .collect(),
            )
        };

        let spec = JudgeSpec::new(model)
            .with_rubric(rubric)
            .with_sensitivity(self.sensitivity)
            .with_show_assessments(self.show_assessments);
        (Some(spec), vec![])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_enums() {
        let config = FileDebateConfig {
            format: "round_limited".to_string(),
            mode: "sequential".to_string(),
            speaking_order: "Rotating".to_string(),
            ..Default::default()
        };
        assert_eq!(config.parse_format().0, DebateFormat::RoundLimited);
        assert_eq!(config.parse_mode().0, ExecutionMode::Sequential);
        assert_eq!(config.parse_speaking_order().0, SpeakingOrder::Rotating);
    }

    #[test]
    fn test_unknown_format_falls_back() {
        let config = FileDebateConfig {
            format: "shouting-match".to_string(),
            ..Default::default()
        };
        let (format, issues) = config.parse_format();
        assert_eq!(format, DebateFormat::FreeForm);
        assert_eq!(issues.len(), 1);
        assert!(!issues[0].is_error());
    }

    #[test]
    fn test_parse_phases_drops_unknown() {
        let config = FileDebateConfig {
            phases: Some(vec!["opening".into(), "lightning".into(), "cross-examination".into()]),
            ..Default::default()
        };
        let (phases, issues) = config.parse_phases();
        assert_eq!(phases, vec![DebatePhase::Opening, DebatePhase::CrossExamination]);
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn test_participant_requires_model() {
        let entry = FileParticipantConfig {
            id: "pro".to_string(),
            ..Default::default()
        };
        let (spec, issues) = entry.to_spec(0);
        assert!(spec.is_none());
        assert_eq!(issues[0].code, ConfigIssueCode::InvalidParticipant);
    }

    #[test]
    fn test_participant_display_name_defaults_to_id() {
        let entry = FileParticipantConfig {
            id: "con".to_string(),
            model: "gpt-4.1".to_string(),
            ..Default::default()
        };
        let (spec, _) = entry.to_spec(1);
        assert_eq!(spec.unwrap().display_name, "con");
    }

    #[test]
    fn test_judge_missing_model() {
        let (spec, issues) = FileJudgeConfig::default().to_spec();
        assert!(spec.is_none());
        assert!(issues[0].is_error());
    }
}
