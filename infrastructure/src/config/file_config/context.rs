//! Context window configuration from TOML (`[context]` section)

use quorum_domain::{CompressionStrategy, ConfigIssue, ConfigIssueCode, ContextSettings};
use serde::{Deserialize, Serialize};

/// Raw context settings from TOML
///
/// ```toml
/// [context]
/// budget_tokens = 8000
/// strategy = "importance-weighted"   # last-n-rounds, exponential-decay, importance-weighted, summarization
/// preserve_first_round = true
/// decay_seed = 42                    # reproducible exponential-decay sampling
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileContextConfig {
    pub budget_tokens: usize,
    pub strategy: String,
    pub preserve_first_round: bool,
    pub recent_fraction: f64,
    pub decay_rate: f64,
    pub decay_seed: Option<u64>,
    pub summarize_fraction: f64,
}

impl Default for FileContextConfig {
    fn default() -> Self {
        let settings = ContextSettings::default();
        Self {
            budget_tokens: settings.budget_tokens,
            strategy: settings.strategy.as_str().to_string(),
            preserve_first_round: settings.preserve_first_round,
            recent_fraction: settings.recent_fraction,
            decay_rate: settings.decay_rate,
            decay_seed: settings.decay_seed,
            summarize_fraction: settings.summarize_fraction,
        }
    }
}

impl FileContextConfig {
    pub fn to_settings(&self) -> (ContextSettings, Vec<ConfigIssue>) {
        let defaults = ContextSettings::default();
        let mut issues = Vec::new();

        let strategy = match self.strategy.parse::<CompressionStrategy>() {
            Ok(strategy) => strategy,
            Err(e) => {
                issues.push(ConfigIssue::warning(
                    ConfigIssueCode::UnknownValue,
                    format!("context.strategy: {}; falling back to 'last-n-rounds'", e),
                ));
                defaults.strategy
            }
        };

        let budget_tokens = if self.budget_tokens == 0 {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::InvalidNumber,
                format!("context.budget_tokens cannot be 0; using {}", defaults.budget_tokens),
            ));
            defaults.budget_tokens
        } else {
            self.budget_tokens
        };

        let decay_rate = if self.decay_rate > 0.0 {
            self.decay_rate
        } else {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::InvalidNumber,
                format!("context.decay_rate must be positive (got {}); using {}", self.decay_rate, defaults.decay_rate),
            ));
            defaults.decay_rate
        };

        let mut fraction = |name: &str, value: f64, fallback: f64| {
            if (0.0..=1.0).contains(&value) {
                value
            } else {
                issues.push(ConfigIssue::warning(
                    ConfigIssueCode::InvalidNumber,
                    format!("context.{} must be within 0.0..=1.0 (got {}); using {}", name, value, fallback),
                ));
                fallback
            }
        };
        let recent_fraction = fraction("recent_fraction", self.recent_fraction, defaults.recent_fraction);
        let summarize_fraction = fraction(
            "summarize_fraction",
            self.summarize_fraction,
            defaults.summarize_fraction,
        );

        let settings = ContextSettings {
            budget_tokens,
            strategy,
            preserve_first_round: self.preserve_first_round,
            recent_fraction,
            decay_rate,
            decay_seed: self.decay_seed,
            summarize_fraction,
        };
        (settings, issues)
    }
}
