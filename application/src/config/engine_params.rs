//! Engine parameters: retry and buffering control.
//!
//! [`EngineParams`] groups the static parameters the debate runner and judge
//! evaluator use. These are application-layer concerns, not domain policy.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineParams {
    /// Extra judge attempts after the first one fails.
    pub judge_retries: u32,
    /// Backoff before the first judge retry; doubles per retry.
    #[serde(with = "millis")]
    pub judge_backoff: Duration,
    /// Token budget for the judge's view of the history.
    pub judge_budget_tokens: usize,
    /// Ask the gateway for exact token counts before falling back to estimates.
    pub exact_token_counts: bool,
    /// Budget multiplier applied to a participant after `context_exceeded`.
    pub context_shrink_factor: f64,
    /// Events kept for `subscribe_after` replay.
    pub event_buffer: usize,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            judge_retries: 2,
            judge_backoff: Duration::from_millis(500),
            judge_budget_tokens: 32_000,
            exact_token_counts: true,
            context_shrink_factor: 0.75,
            event_buffer: 10_000,
        }
    }
}

impl EngineParams {
    // ==================== Builder Methods ====================

    pub fn with_judge_retries(mut self, retries: u32) -> Self {
        self.judge_retries = retries;
        self
    }

    pub fn with_judge_backoff(mut self, backoff: Duration) -> Self {
        self.judge_backoff = backoff;
        self
    }

    pub fn with_judge_budget_tokens(mut self, tokens: usize) -> Self {
        self.judge_budget_tokens = tokens;
        self
    }

    pub fn with_exact_token_counts(mut self, exact: bool) -> Self {
        self.exact_token_counts = exact;
        self
    }

    pub fn with_event_buffer(mut self, size: usize) -> Self {
        self.event_buffer = size;
        self
    }

    /// Backoff before judge retry number `attempt` (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.judge_backoff * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
