//! Token and cost accounting for one debate.

use super::ledger::{CostLedger, CostRecord, CostSnapshot, CostThresholds, CostTier, CostWarning};
use super::pricing::PricingTable;
use crate::core::model::ModelId;
use crate::session::usage::TokenUsage;
use chrono::Utc;

/// Prices usage, keeps the [`CostLedger`] and fires tier warnings.
///
/// Owned by the debate runner; there is a single writer.
#[derive(Debug, Clone)]
pub struct CostAccountant {
    pricing: PricingTable,
    thresholds: CostThresholds,
    hard_limit: Option<f64>,
    ledger: CostLedger,
}

impl CostAccountant {
    pub fn new(pricing: PricingTable, thresholds: CostThresholds, hard_limit: Option<f64>) -> Self {
        Self {
            pricing,
            thresholds,
            hard_limit,
            ledger: CostLedger::default(),
        }
    }

    /// Resume from a persisted ledger.
    pub fn with_ledger(mut self, ledger: CostLedger) -> Self {
        self.ledger = ledger;
        self
    }

    pub fn record_usage(&mut self, model: &ModelId, usage: TokenUsage) -> CostRecord {
        let lookup = self.pricing.lookup(model);
        let cost = lookup.pricing.cost_of(&usage);
        self.ledger.add(model, usage, cost);
        CostRecord {
            model: model.clone(),
            usage,
            cost,
            total_after: self.ledger.total,
            fallback_pricing: !lookup.known,
        }
    }

    /// Record an already-priced amount (e.g. a response replayed from history).
    pub fn record_cost(&mut self, model: &ModelId, usage: TokenUsage, cost: f64) {
        self.ledger.add(model, usage, cost);
    }

    pub fn estimate_cost(&self, model: &ModelId, usage: &TokenUsage) -> f64 {
        self.pricing.lookup(model).pricing.cost_of(usage)
    }

    pub fn current_total(&self) -> f64 {
        self.ledger.total
    }

    /// Fire the lowest crossed tier that has not fired yet.
    ///
    /// Returns at most one warning per call; a jump across several tiers is
    /// reported by calling again until `None`. Polling while the total stays
    /// within a tier never fires twice.
    pub fn check_thresholds(&mut self) -> Option<CostWarning> {
        let fired = self.ledger.highest_tier();
        let tier = CostTier::ALL.into_iter().find(|tier| {
            fired.is_none_or(|f| *tier > f)
                && self.ledger.total >= self.thresholds.threshold(*tier)
        })?;
        let warning = CostWarning {
            tier,
            threshold: self.thresholds.threshold(tier),
            cost_at_firing: self.ledger.total,
            fired_at: Utc::now(),
        };
        self.ledger.warnings.push(warning.clone());
        Some(warning)
    }

    /// Drain every pending tier crossing.
    pub fn drain_warnings(&mut self) -> Vec<CostWarning> {
        std::iter::from_fn(|| self.check_thresholds()).collect()
    }

    /// Hard limit reached, or critical tier reached with auto-stop.
    pub fn is_hard_limit_breached(&self) -> bool {
        let hard = self.hard_limit.is_some_and(|limit| self.ledger.total >= limit);
        let critical = self.thresholds.auto_stop && self.ledger.total >= self.thresholds.critical;
        hard || critical
    }

    pub fn ledger(&self) -> &CostLedger {
        &self.ledger
    }

    pub fn snapshot(&self) -> CostSnapshot {
        self.ledger.snapshot()
    }

    pub fn thresholds(&self) -> &CostThresholds {
        &self.thresholds
    }
}
