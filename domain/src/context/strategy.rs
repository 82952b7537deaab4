//! Context compression settings.

use serde::{Deserialize, Serialize};

/// How debate history is compressed when it does not fit the budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CompressionStrategy {
    /// Keep round 1 (optional) plus as many recent rounds as fit.
    #[default]
    LastNRounds,
    /// Keep recent rounds, sample older ones with exponentially decaying probability.
    ExponentialDecay,
    /// Keep the highest-scoring rounds by a recency/content heuristic.
    ImportanceWeighted,
    /// Ask an LLM to summarize the oldest rounds, then window the rest.
    Summarization,
}

impl CompressionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionStrategy::LastNRounds => "last-n-rounds",
            CompressionStrategy::ExponentialDecay => "exponential-decay",
            CompressionStrategy::ImportanceWeighted => "importance-weighted",
            CompressionStrategy::Summarization => "summarization",
        }
    }
}

impl std::fmt::Display for CompressionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for CompressionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "last-n-rounds" | "last-n" | "sliding-window" => Ok(CompressionStrategy::LastNRounds),
            "exponential-decay" | "decay" => Ok(CompressionStrategy::ExponentialDecay),
            "importance-weighted" | "importance" => Ok(CompressionStrategy::ImportanceWeighted),
            "summarization" | "summarize" => Ok(CompressionStrategy::Summarization),
            other => Err(format!(
                "Unknown context strategy: {}. Valid: last-n-rounds, exponential-decay, importance-weighted, summarization",
                other
            )),
        }
    }
}

/// Context window settings shared by all participants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextSettings {
    /// Token budget for system prompt plus visible history.
    pub budget_tokens: usize,
    pub strategy: CompressionStrategy,
    /// Always keep round 1 (topic framing) when it fits.
    pub preserve_first_round: bool,
    /// Share of most recent rounds kept in full by exponential decay.
    pub recent_fraction: f64,
    /// λ in `exp(-λ·distance)` for exponential decay.
    pub decay_rate: f64,
    /// Seed for exponential-decay sampling; `None` draws from entropy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decay_seed: Option<u64>,
    /// Share of oldest rounds folded into a summary.
    pub summarize_fraction: f64,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            budget_tokens: 8_000,
            strategy: CompressionStrategy::LastNRounds,
            preserve_first_round: true,
            recent_fraction: 0.3,
            decay_rate: 0.5,
            decay_seed: None,
            summarize_fraction: 0.7,
        }
    }
}

impl ContextSettings {
    pub fn with_budget(mut self, budget_tokens: usize) -> Self {
        self.budget_tokens = budget_tokens;
        self
    }

    pub fn with_strategy(mut self, strategy: CompressionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_decay_seed(mut self, seed: u64) -> Self {
        self.decay_seed = Some(seed);
        self
    }

    pub fn with_preserve_first_round(mut self, preserve: bool) -> Self {
        self.preserve_first_round = preserve;
        self
    }
}
