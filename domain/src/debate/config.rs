//! Debate configuration entities.
//!
//! A [`DebateConfiguration`] is assembled before a debate starts and is
//! never mutated afterwards. [`DebateConfiguration::validate`] is the single
//! gate the lifecycle applies on `START`.

use crate::context::strategy::ContextSettings;
use crate::core::error::DomainError;
use crate::core::model::ModelId;
use crate::cost::ledger::CostThresholds;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

/// Allowed deviation of the rubric weight sum from 1.0.
pub const WEIGHT_EPSILON: f64 = 0.01;

/// Round cap applied when a format has no explicit round limit.
pub const DEFAULT_SAFETY_ROUNDS: u32 = 50;

/// Default per-participant invocation timeout.
pub const DEFAULT_ROUND_TIMEOUT_SECS: u64 = 90;

/// How the debate decides when it is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DebateFormat {
    /// Runs until the judge or a guard stops it.
    #[default]
    FreeForm,
    /// Follows a fixed phase list (opening, rebuttal, closing, ...).
    StructuredRounds,
    /// Stops at `max_rounds`.
    RoundLimited,
    /// Stops once the judge reports convergence.
    ConvergenceSeeking,
}

impl DebateFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            DebateFormat::FreeForm => "free-form",
            DebateFormat::StructuredRounds => "structured-rounds",
            DebateFormat::RoundLimited => "round-limited",
            DebateFormat::ConvergenceSeeking => "convergence-seeking",
        }
    }
}

impl std::fmt::Display for DebateFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DebateFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "free-form" | "freeform" => Ok(DebateFormat::FreeForm),
            "structured-rounds" | "structured" => Ok(DebateFormat::StructuredRounds),
            "round-limited" | "rounds" => Ok(DebateFormat::RoundLimited),
            "convergence-seeking" | "convergence" => Ok(DebateFormat::ConvergenceSeeking),
            other => Err(format!(
                "Unknown debate format: {}. Valid: free-form, structured-rounds, round-limited, convergence-seeking",
                other
            )),
        }
    }
}

/// Whether participants speak concurrently or one after another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Simultaneous,
    Sequential,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Simultaneous => "simultaneous",
            ExecutionMode::Sequential => "sequential",
        }
    }
}

impl std::str::FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "simultaneous" | "parallel" => Ok(ExecutionMode::Simultaneous),
            "sequential" => Ok(ExecutionMode::Sequential),
            other => Err(format!(
                "Unknown execution mode: {}. Valid: simultaneous, sequential",
                other
            )),
        }
    }
}

/// Speaking order in sequential mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpeakingOrder {
    /// Configuration order every round.
    #[default]
    Fixed,
    /// Round N starts with participant `(N - 1) % len`.
    Rotating,
}

/// Named phase of a structured debate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebatePhase {
    Opening,
    Rebuttal,
    CrossExamination,
    Closing,
}

impl DebatePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            DebatePhase::Opening => "opening",
            DebatePhase::Rebuttal => "rebuttal",
            DebatePhase::CrossExamination => "cross_examination",
            DebatePhase::Closing => "closing",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            DebatePhase::Opening => "Opening Statements",
            DebatePhase::Rebuttal => "Rebuttals",
            DebatePhase::CrossExamination => "Cross-Examination",
            DebatePhase::Closing => "Closing Statements",
        }
    }

    /// Default phase list for structured-rounds debates.
    pub fn default_sequence() -> Vec<DebatePhase> {
        vec![
            DebatePhase::Opening,
            DebatePhase::Rebuttal,
            DebatePhase::Closing,
        ]
    }
}

/// One configured debater.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantSpec {
    pub id: String,
    pub display_name: String,
    pub model: ModelId,
    /// Assigned persona or position, e.g. "Argue in favor of the motion".
    pub persona: String,
    /// Replaces the generated system prompt entirely when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl ParticipantSpec {
    pub fn new(
        id: impl Into<String>,
        model: impl Into<ModelId>,
        persona: impl Into<String>,
    ) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            id,
            model: model.into(),
            persona: persona.into(),
            system_prompt: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }
}

/// A single rubric criterion and its weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    pub name: String,
    pub weight: f64,
}

impl Criterion {
    pub fn new(name: impl Into<String>, weight: f64) -> Self {
        Self {
            name: name.into(),
            weight,
        }
    }
}

/// Ordered evaluation rubric. Weights must sum to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rubric {
    pub criteria: Vec<Criterion>,
}

impl Rubric {
    pub fn new(criteria: Vec<Criterion>) -> Self {
        Self { criteria }
    }

    pub fn weight_sum(&self) -> f64 {
        self.criteria.iter().map(|c| c.weight).sum()
    }

    pub fn criterion_names(&self) -> impl Iterator<Item = &str> {
        self.criteria.iter().map(|c| c.name.as_str())
    }

    /// Weighted total of a per-criterion score map. Missing criteria count as 0.
    pub fn weighted_total(&self, scores: &BTreeMap<String, f64>) -> f64 {
        self.criteria
            .iter()
            .map(|c| scores.get(&c.name).copied().unwrap_or(0.0) * c.weight)
            .sum()
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.criteria.is_empty() {
            return Err(DomainError::EmptyRubric);
        }
        let sum = self.weight_sum();
        if (sum - 1.0).abs() > WEIGHT_EPSILON {
            return Err(DomainError::RubricWeights(sum));
        }
        Ok(())
    }
}

impl Default for Rubric {
    fn default() -> Self {
        Self::new(vec![
            Criterion::new("argument_quality", 0.3),
            Criterion::new("evidence", 0.25),
            Criterion::new("rebuttal", 0.25),
            Criterion::new("clarity", 0.2),
        ])
    }
}

/// Sensitivities for the judge's stop detection, each in `[0, 1]`.
///
/// `0.0` disables the corresponding flag; higher values make the judge
/// quicker to raise it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StopSensitivity {
    pub repetition: f64,
    pub drift: f64,
    pub convergence: f64,
}

impl StopSensitivity {
    pub fn any_enabled(&self) -> bool {
        self.repetition > 0.0 || self.convergence > 0.0
    }

    fn validate(&self) -> Result<(), DomainError> {
        for (name, value) in [
            ("repetition", self.repetition),
            ("drift", self.drift),
            ("convergence", self.convergence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(DomainError::InvalidLimit(format!(
                    "judge sensitivity {} must be within 0.0..=1.0 (got {})",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

impl Default for StopSensitivity {
    fn default() -> Self {
        Self {
            repetition: 0.5,
            drift: 0.5,
            convergence: 0.5,
        }
    }
}

/// The evaluator of the debate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeSpec {
    pub model: ModelId,
    #[serde(default)]
    pub rubric: Rubric,
    #[serde(default)]
    pub sensitivity: StopSensitivity,
    /// Assessments are always computed; this only controls whether they
    /// are surfaced to subscribers and exports.
    #[serde(default = "default_true")]
    pub show_assessments: bool,
}

fn default_true() -> bool {
    true
}

impl JudgeSpec {
    pub fn new(model: impl Into<ModelId>) -> Self {
        Self {
            model: model.into(),
            rubric: Rubric::default(),
            sensitivity: StopSensitivity::default(),
            show_assessments: true,
        }
    }

    pub fn with_rubric(mut self, rubric: Rubric) -> Self {
        self.rubric = rubric;
        self
    }

    pub fn with_sensitivity(mut self, sensitivity: StopSensitivity) -> Self {
        self.sensitivity = sensitivity;
        self
    }

    pub fn with_show_assessments(mut self, show: bool) -> Self {
        self.show_assessments = show;
        self
    }
}

/// Numeric limits of a debate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebateLimits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rounds: Option<u32>,
    pub round_timeout_secs: u64,
    /// Three-tier warning thresholds; the first tier is the warning threshold.
    #[serde(default)]
    pub cost_thresholds: CostThresholds,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_hard_limit: Option<f64>,
}

impl DebateLimits {
    pub fn round_timeout(&self) -> Duration {
        Duration::from_secs(self.round_timeout_secs)
    }

    pub fn cost_warning_threshold(&self) -> f64 {
        self.cost_thresholds.warn
    }

    fn validate(&self) -> Result<(), DomainError> {
        if self.max_rounds == Some(0) {
            return Err(DomainError::InvalidLimit("max_rounds must be >= 1".into()));
        }
        if self.round_timeout_secs == 0 {
            return Err(DomainError::InvalidLimit(
                "round_timeout_secs cannot be 0".into(),
            ));
        }
        if let Some(limit) = self.cost_hard_limit
            && limit <= 0.0
        {
            return Err(DomainError::InvalidLimit(format!(
                "cost_hard_limit must be positive (got {})",
                limit
            )));
        }
        self.cost_thresholds.validate().map_err(DomainError::InvalidLimit)
    }
}

impl Default for DebateLimits {
    fn default() -> Self {
        Self {
            max_rounds: None,
            round_timeout_secs: DEFAULT_ROUND_TIMEOUT_SECS,
            cost_thresholds: CostThresholds::default(),
            cost_hard_limit: None,
        }
    }
}

/// Complete, immutable description of one debate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebateConfiguration {
    pub topic: String,
    #[serde(default)]
    pub format: DebateFormat,
    pub participants: Vec<ParticipantSpec>,
    pub judge: JudgeSpec,
    #[serde(default)]
    pub execution_mode: ExecutionMode,
    #[serde(default)]
    pub speaking_order: SpeakingOrder,
    /// Phase list for structured-rounds debates.
    #[serde(default = "DebatePhase::default_sequence")]
    pub phases: Vec<DebatePhase>,
    #[serde(default)]
    pub limits: DebateLimits,
    #[serde(default)]
    pub context: ContextSettings,
}

impl DebateConfiguration {
    pub fn new(
        topic: impl Into<String>,
        participants: Vec<ParticipantSpec>,
        judge: JudgeSpec,
    ) -> Self {
        Self {
            topic: topic.into(),
            format: DebateFormat::default(),
            participants,
            judge,
            execution_mode: ExecutionMode::default(),
            speaking_order: SpeakingOrder::default(),
            phases: DebatePhase::default_sequence(),
            limits: DebateLimits::default(),
            context: ContextSettings::default(),
        }
    }

    // ==================== Builder Methods ====================

    pub fn with_format(mut self, format: DebateFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.execution_mode = mode;
        self
    }

    pub fn with_speaking_order(mut self, order: SpeakingOrder) -> Self {
        self.speaking_order = order;
        self
    }

    pub fn with_phases(mut self, phases: Vec<DebatePhase>) -> Self {
        self.phases = phases;
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.limits.max_rounds = Some(max_rounds);
        self
    }

    pub fn with_round_timeout_secs(mut self, secs: u64) -> Self {
        self.limits.round_timeout_secs = secs;
        self
    }

    pub fn with_cost_hard_limit(mut self, limit: f64) -> Self {
        self.limits.cost_hard_limit = Some(limit);
        self
    }

    pub fn with_cost_thresholds(mut self, thresholds: CostThresholds) -> Self {
        self.limits.cost_thresholds = thresholds;
        self
    }

    pub fn with_context(mut self, context: ContextSettings) -> Self {
        self.context = context;
        self
    }

    // ==================== Queries ====================

    pub fn participant(&self, id: &str) -> Option<&ParticipantSpec> {
        self.participants.iter().find(|p| p.id == id)
    }

    /// Upper bound on rounds regardless of format.
    pub fn round_cap(&self) -> u32 {
        match self.format {
            DebateFormat::StructuredRounds => self.phases.len().max(1) as u32,
            _ => self.limits.max_rounds.unwrap_or(DEFAULT_SAFETY_ROUNDS),
        }
    }

    /// Phase label for a 1-based round number (structured-rounds only).
    pub fn phase_for_round(&self, round_number: u32) -> Option<DebatePhase> {
        if self.format != DebateFormat::StructuredRounds || round_number == 0 {
            return None;
        }
        self.phases.get(round_number as usize - 1).copied()
    }

    /// Whether a structured debate has used up its phase list after `round_number`.
    pub fn phases_exhausted(&self, round_number: u32) -> bool {
        self.format == DebateFormat::StructuredRounds
            && round_number as usize >= self.phases.len()
    }

    /// Participant order for a round in sequential mode.
    pub fn speaking_order_for_round(&self, round_number: u32) -> Vec<&ParticipantSpec> {
        let n = self.participants.len();
        if n == 0 {
            return Vec::new();
        }
        let start = match self.speaking_order {
            SpeakingOrder::Fixed => 0,
            SpeakingOrder::Rotating => (round_number.saturating_sub(1) as usize) % n,
        };
        (0..n).map(|i| &self.participants[(start + i) % n]).collect()
    }

    fn has_stop_condition(&self) -> bool {
        self.limits.max_rounds.is_some()
            || self.limits.cost_hard_limit.is_some()
            || self.limits.cost_thresholds.auto_stop
            || self.judge.sensitivity.any_enabled()
    }

    // ==================== Validation ====================

    /// Validate the configuration. Failures are fatal and non-retryable.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.topic.trim().is_empty() {
            return Err(DomainError::EmptyTopic);
        }
        if self.participants.len() < 2 {
            return Err(DomainError::TooFewParticipants(self.participants.len()));
        }
        let mut seen = HashSet::new();
        for participant in &self.participants {
            if !seen.insert(participant.id.as_str()) {
                return Err(DomainError::DuplicateParticipant(participant.id.clone()));
            }
            if participant.model.is_empty() {
                return Err(DomainError::MissingParticipantModel(participant.id.clone()));
            }
        }
        if self.judge.model.is_empty() {
            return Err(DomainError::MissingJudge);
        }
        self.judge.rubric.validate()?;
        self.judge.sensitivity.validate()?;
        self.limits.validate()?;
        match self.format {
            DebateFormat::RoundLimited if self.limits.max_rounds.is_none() => {
                return Err(DomainError::InvalidLimit(
                    "round-limited debates require max_rounds".into(),
                ));
            }
            DebateFormat::StructuredRounds if self.phases.is_empty() => {
                return Err(DomainError::InvalidLimit(
                    "structured-rounds debates require at least one phase".into(),
                ));
            }
            DebateFormat::FreeForm if !self.has_stop_condition() => {
                return Err(DomainError::NoStopCondition);
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_participants() -> Vec<ParticipantSpec> {
        vec![
            ParticipantSpec::new("pro", "claude-sonnet-4.5", "Argue for the motion"),
            ParticipantSpec::new("con", "gpt-5.2", "Argue against the motion"),
        ]
    }

    fn config() -> DebateConfiguration {
        DebateConfiguration::new(
            "Should cities ban cars?",
            two_participants(),
            JudgeSpec::new("claude-opus-4.5"),
        )
    }

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(config().validate(), Ok(()));
    }

    #[test]
    fn test_rejects_single_participant() {
        let mut c = config();
        c.participants.truncate(1);
        assert_eq!(c.validate(), Err(DomainError::TooFewParticipants(1)));
    }

    #[test]
    fn test_rejects_bad_weights() {
        let c = DebateConfiguration::new(
            "Topic",
            two_participants(),
            JudgeSpec::new("judge").with_rubric(Rubric::new(vec![
                Criterion::new("a", 0.5),
                Criterion::new("b", 0.3),
            ])),
        );
        assert!(matches!(c.validate(), Err(DomainError::RubricWeights(_))));
    }

    #[test]
    fn test_weights_within_epsilon_pass() {
        let rubric = Rubric::new(vec![Criterion::new("a", 0.504), Criterion::new("b", 0.5)]);
        assert!(rubric.validate().is_ok());
    }

    #[test]
    fn test_missing_judge() {
        let mut c = config();
        c.judge.model = ModelId::from("");
        assert_eq!(c.validate(), Err(DomainError::MissingJudge));
    }

    #[test]
    fn test_duplicate_participant() {
        let mut c = config();
        c.participants[1].id = "pro".into();
        assert_eq!(
            c.validate(),
            Err(DomainError::DuplicateParticipant("pro".into()))
        );
    }

    #[test]
    fn test_free_form_without_stop_condition() {
        let mut c = config();
        c.judge.sensitivity = StopSensitivity {
            repetition: 0.0,
            drift: 0.0,
            convergence: 0.0,
        };
        assert_eq!(c.validate(), Err(DomainError::NoStopCondition));
        assert!(c.with_max_rounds(3).validate().is_ok());
    }

    #[test]
    fn test_round_limited_requires_max_rounds() {
        let c = config().with_format(DebateFormat::RoundLimited);
        assert!(matches!(c.validate(), Err(DomainError::InvalidLimit(_))));
        assert!(c.with_max_rounds(2).validate().is_ok());
    }

    #[test]
    fn test_rotating_speaking_order() {
        let mut c = config().with_speaking_order(SpeakingOrder::Rotating);
        c.participants
            .push(ParticipantSpec::new("third", "gemini-3-pro-preview", "Moderate"));
        let ids = |round| {
            c.speaking_order_for_round(round)
                .iter()
                .map(|p| p.id.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(ids(1), vec!["pro", "con", "third"]);
        assert_eq!(ids(2), vec!["con", "third", "pro"]);
        assert_eq!(ids(4), vec!["pro", "con", "third"]);
    }

    #[test]
    fn test_structured_phases() {
        let c = config().with_format(DebateFormat::StructuredRounds);
        assert_eq!(c.phase_for_round(1), Some(DebatePhase::Opening));
        assert_eq!(c.phase_for_round(3), Some(DebatePhase::Closing));
        assert_eq!(c.phase_for_round(4), None);
        assert!(!c.phases_exhausted(2));
        assert!(c.phases_exhausted(3));
        assert_eq!(c.round_cap(), 3);
    }

    #[test]
    fn test_weighted_total() {
        let rubric = Rubric::default();
        let scores: BTreeMap<String, f64> = rubric
            .criterion_names()
            .map(|n| (n.to_string(), 10.0))
            .collect();
        assert!((rubric.weighted_total(&scores) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_format_parse() {
        assert_eq!(
            "convergence_seeking".parse::<DebateFormat>().unwrap(),
            DebateFormat::ConvergenceSeeking
        );
        assert!("chaos".parse::<DebateFormat>().is_err());
    }

    #[test]
    fn test_serde_roundtrip_uses_kebab_case() {
        let json = serde_json::to_string(&DebateFormat::RoundLimited).unwrap();
        assert_eq!(json, "\"round-limited\"");
        let c = config().with_max_rounds(4);
        let back: DebateConfiguration =
            serde_json::from_str(&serde_json::to_string(&c).unwrap()).unwrap();
        assert_eq!(back, c);
    }
}
