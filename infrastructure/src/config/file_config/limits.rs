//! Limits, cost tiers and pricing from TOML (`[limits]`, `[costs]`, `[pricing.<model>]`)

use quorum_domain::{
    ConfigIssue, ConfigIssueCode, CostThresholds, DebateLimits, ModelPricing, PricingTable,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw limits from TOML
///
/// ```toml
/// [limits]
/// max_rounds = 5
/// round_timeout_secs = 90
/// cost_warning = 0.25     # overrides [costs] warn
/// cost_hard_limit = 3.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLimitsConfig {
    pub max_rounds: Option<u32>,
    pub round_timeout_secs: u64,
    pub cost_warning: Option<f64>,
    pub cost_hard_limit: Option<f64>,
}

impl Default for FileLimitsConfig {
    fn default() -> Self {
        let limits = DebateLimits::default();
        Self {
            max_rounds: limits.max_rounds,
            round_timeout_secs: limits.round_timeout_secs,
            cost_warning: None,
            cost_hard_limit: limits.cost_hard_limit,
        }
    }
}

impl FileLimitsConfig {
    /// Combine with the `[costs]` tiers. Out-of-range values are replaced by
    /// defaults with a warning.
    pub fn to_limits(&self, costs: &CostThresholds) -> (DebateLimits, Vec<ConfigIssue>) {
        let defaults = DebateLimits::default();
        let mut issues = Vec::new();

        let max_rounds = match self.max_rounds {
            Some(0) => {
                issues.push(invalid_number("limits.max_rounds must be at least 1; ignoring"));
                None
            }
            other => other,
        };

        let round_timeout_secs = if self.round_timeout_secs == 0 {
            issues.push(invalid_number(format!(
                "limits.round_timeout_secs cannot be 0; using {}",
                defaults.round_timeout_secs
            )));
            defaults.round_timeout_secs
        } else {
            self.round_timeout_secs
        };

        let cost_hard_limit = match self.cost_hard_limit {
            Some(limit) if limit <= 0.0 => {
                issues.push(invalid_number(format!(
                    "limits.cost_hard_limit must be positive (got {}); ignoring",
                    limit
                )));
                None
            }
            other => other,
        };

        let mut thresholds = *costs;
        if let Some(warn) = self.cost_warning {
            thresholds.warn = warn;
        }
        if let Err(e) = thresholds.validate() {
            issues.push(invalid_number(format!("{}; using default cost tiers", e)));
            thresholds = CostThresholds::default();
        }

        let limits = DebateLimits {
            max_rounds,
            round_timeout_secs,
            cost_thresholds: thresholds,
            cost_hard_limit,
        };
        (limits, issues)
    }
}

fn invalid_number(message: impl Into<String>) -> ConfigIssue {
    ConfigIssue::warning(ConfigIssueCode::InvalidNumber, message)
}

/// Build the injected pricing table: built-in figures overridden by
/// `[pricing.<model>]` entries. Negative prices are skipped.
///
/// ```toml
/// [pricing."gpt-4.1"]
/// input_per_million = 2.0
/// output_per_million = 8.0
/// ```
pub fn to_pricing_table(entries: &BTreeMap<String, ModelPricing>) -> (PricingTable, Vec<ConfigIssue>) {
    let mut table = PricingTable::default();
    let mut issues = Vec::new();
    for (model, pricing) in entries {
        if pricing.input_per_million < 0.0 || pricing.output_per_million < 0.0 {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::InvalidPricing,
                format!("pricing.{}: prices cannot be negative; entry ignored", model),
            ));
            continue;
        }
        table.insert(model.clone(), *pricing);
    }
    (table, issues)
}
