//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and converted into domain types, collecting
//! [`ConfigIssue`]s instead of failing on the first bad value.

mod context;
mod debate;
mod limits;
mod output;
mod provider;

pub use context::FileContextConfig;
pub use debate::{FileDebateConfig, FileJudgeConfig, FileParticipantConfig};
pub use limits::{FileLimitsConfig, to_pricing_table};
pub use output::FileOutputConfig;
pub use provider::FileProviderConfig;

use quorum_application::EngineParams;
use quorum_domain::{
    ConfigIssue, ConfigIssueCode, CostThresholds, DebateConfiguration, ModelPricing, PricingTable,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Topic, format and turn-taking
    pub debate: FileDebateConfig,
    /// Debaters, in speaking order
    pub participants: Vec<FileParticipantConfig>,
    /// Judge model, rubric and stop sensitivities
    pub judge: FileJudgeConfig,
    /// Round, timeout and spend limits
    pub limits: FileLimitsConfig,
    /// Three-tier cost warnings
    pub costs: CostThresholds,
    /// Per-model prices layered over the built-in table
    pub pricing: BTreeMap<String, ModelPricing>,
    /// History compression
    pub context: FileContextConfig,
    /// OpenAI-compatible endpoint
    pub provider: FileProviderConfig,
    /// Exports and logs
    pub output: FileOutputConfig,
    /// Engine tuning (judge retries, replay buffer, ...)
    pub engine: EngineParams,
}

impl FileConfig {
    /// Assemble the debate. Returns `None` when any error-severity issue was
    /// found; warnings leave the affected value at its default.
    pub fn to_debate_configuration(&self) -> (Option<DebateConfiguration>, Vec<ConfigIssue>) {
        let mut issues = Vec::new();

        let (format, format_issues) = self.debate.parse_format();
        let (mode, mode_issues) = self.debate.parse_mode();
        let (order, order_issues) = self.debate.parse_speaking_order();
        let (phases, phase_issues) = self.debate.parse_phases();
        let (judge, judge_issues) = self.judge.to_spec();
        let (limits, limit_issues) = self.limits.to_limits(&self.costs);
        let (context, context_issues) = self.context.to_settings();
        issues.extend(
            [
                format_issues,
                mode_issues,
                order_issues,
                phase_issues,
                judge_issues,
                limit_issues,
                context_issues,
            ]
            .into_iter()
            .flatten(),
        );

        let mut participants = Vec::with_capacity(self.participants.len());
        for (index, entry) in self.participants.iter().enumerate() {
            let (spec, entry_issues) = entry.to_spec(index);
            issues.extend(entry_issues);
            participants.extend(spec);
        }

        let topic = self.debate.topic.clone().unwrap_or_default();
        let Some(judge) = judge else {
            return (None, issues);
        };
        if issues.iter().any(ConfigIssue::is_error) {
            return (None, issues);
        }

        let config = DebateConfiguration::new(topic, participants, judge)
            .with_format(format)
            .with_execution_mode(mode)
            .with_speaking_order(order)
            .with_phases(phases)
            .with_context(context);
        let config = DebateConfiguration { limits, ..config };

        if let Err(e) = config.validate() {
            issues.push(ConfigIssue::error(ConfigIssueCode::InvalidDebate, e.to_string()));
            return (None, issues);
        }
        (Some(config), issues)
    }

    pub fn to_pricing_table(&self) -> (PricingTable, Vec<ConfigIssue>) {
        to_pricing_table(&self.pricing)
    }

    /// Every issue the configuration would produce.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = self.to_debate_configuration().1;
        issues.extend(self.to_pricing_table().1);
        issues
    }
}
