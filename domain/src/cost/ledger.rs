//! Cost ledger value objects.

use crate::core::model::ModelId;
use crate::session::usage::TokenUsage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Escalating cost tiers. Ordering follows severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostTier {
    Warn,
    Escalate,
    Critical,
}

impl CostTier {
    pub const ALL: [CostTier; 3] = [CostTier::Warn, CostTier::Escalate, CostTier::Critical];

    pub fn as_str(&self) -> &'static str {
        match self {
            CostTier::Warn => "warn",
            CostTier::Escalate => "escalate",
            CostTier::Critical => "critical",
        }
    }
}

impl std::fmt::Display for CostTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Three-tier warning thresholds in USD.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostThresholds {
    pub warn: f64,
    pub escalate: f64,
    pub critical: f64,
    /// Treat reaching the critical tier as a hard cost-limit breach.
    pub auto_stop: bool,
}

impl CostThresholds {
    pub fn threshold(&self, tier: CostTier) -> f64 {
        match tier {
            CostTier::Warn => self.warn,
            CostTier::Escalate => self.escalate,
            CostTier::Critical => self.critical,
        }
    }

    /// Tiers must be positive and strictly increasing.
    pub fn validate(&self) -> Result<(), String> {
        if self.warn <= 0.0 {
            return Err(format!("cost warn threshold must be positive (got {})", self.warn));
        }
        if !(self.warn < self.escalate && self.escalate < self.critical) {
            return Err(format!(
                "cost thresholds must increase: warn {} < escalate {} < critical {}",
                self.warn, self.escalate, self.critical
            ));
        }
        Ok(())
    }
}

impl Default for CostThresholds {
    fn default() -> Self {
        Self {
            warn: 0.50,
            escalate: 1.00,
            critical: 2.00,
            auto_stop: true,
        }
    }
}

/// A tier crossing, fired at most once per tier per debate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostWarning {
    pub tier: CostTier,
    pub threshold: f64,
    pub cost_at_firing: f64,
    pub fired_at: DateTime<Utc>,
}

/// Outcome of a single `record_usage` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostRecord {
    pub model: ModelId,
    pub usage: TokenUsage,
    pub cost: f64,
    pub total_after: f64,
    /// The model was missing from the pricing table.
    pub fallback_pricing: bool,
}

/// Running totals for one debate. All figures are non-decreasing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CostLedger {
    pub total: f64,
    pub by_model: BTreeMap<String, f64>,
    pub tokens_by_model: BTreeMap<String, TokenUsage>,
    pub warnings: Vec<CostWarning>,
}

impl CostLedger {
    pub fn add(&mut self, model: &ModelId, usage: TokenUsage, cost: f64) {
        let cost = cost.max(0.0);
        self.total += cost;
        *self.by_model.entry(model.to_string()).or_insert(0.0) += cost;
        *self.tokens_by_model.entry(model.to_string()).or_default() += usage;
    }

    pub fn highest_tier(&self) -> Option<CostTier> {
        self.warnings.iter().map(|w| w.tier).max()
    }

    pub fn total_tokens(&self) -> TokenUsage {
        self.tokens_by_model.values().copied().sum()
    }

    pub fn snapshot(&self) -> CostSnapshot {
        CostSnapshot {
            total: self.total,
            by_model: self.by_model.clone(),
            tokens: self.total_tokens(),
            highest_tier: self.highest_tier(),
        }
    }
}

/// Point-in-time view of the ledger carried by events and the verdict.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CostSnapshot {
    pub total: f64,
    pub by_model: BTreeMap<String, f64>,
    pub tokens: TokenUsage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highest_tier: Option<CostTier>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds_valid() {
        assert!(CostThresholds::default().validate().is_ok());
    }

    #[test]
    fn test_thresholds_must_increase() {
        let t = CostThresholds {
            warn: 1.0,
            escalate: 0.5,
            critical: 2.0,
            auto_stop: false,
        };
        assert!(t.validate().is_err());
    }

    #[test]
    fn test_ledger_accumulates_per_model() {
        let mut ledger = CostLedger::default();
        let a = ModelId::from("a");
        ledger.add(&a, TokenUsage::new(10, 5), 0.1);
        ledger.add(&a, TokenUsage::new(1, 1), 0.2);
        ledger.add(&ModelId::from("b"), TokenUsage::new(3, 0), 0.05);

        assert!((ledger.total - 0.35).abs() < 1e-9);
        assert!((ledger.by_model["a"] - 0.3).abs() < 1e-9);
        assert_eq!(ledger.tokens_by_model["a"], TokenUsage::new(11, 6));
        assert_eq!(ledger.snapshot().tokens, TokenUsage::new(14, 6));
    }

    #[test]
    fn test_tier_ordering() {
        assert!(CostTier::Warn < CostTier::Escalate);
        assert!(CostTier::Escalate < CostTier::Critical);
    }
}
