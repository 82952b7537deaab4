//! Per-model token pricing.
//!
//! Prices drift as providers change them, so the table is injected from
//! configuration. [`PricingTable::default`] only carries illustrative figures
//! that keep a debate usable when nothing is configured.

use crate::core::model::ModelId;
use crate::session::usage::TokenUsage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// USD per million tokens, split by direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl ModelPricing {
    pub const fn new(input_per_million: f64, output_per_million: f64) -> Self {
        Self {
            input_per_million,
            output_per_million,
        }
    }

    /// `prompt / 1e6 * input + completion / 1e6 * output`
    pub fn cost_of(&self, usage: &TokenUsage) -> f64 {
        (usage.prompt_tokens as f64 / 1_000_000.0) * self.input_per_million
            + (usage.completion_tokens as f64 / 1_000_000.0) * self.output_per_million
    }
}

/// Conservative price used for models missing from the table.
pub const FALLBACK_PRICING: ModelPricing = ModelPricing::new(15.0, 75.0);

/// Result of a pricing lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceLookup {
    pub pricing: ModelPricing,
    /// `false` when [`FALLBACK_PRICING`] was used.
    pub known: bool,
}

/// Pricing keyed by model id.
///
/// Lookup tries an exact match first, then the longest configured key that
/// prefixes the model id (so `claude-sonnet-4` prices `claude-sonnet-4.5`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PricingTable {
    entries: BTreeMap<String, ModelPricing>,
}

impl PricingTable {
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn with(mut self, model: impl Into<String>, pricing: ModelPricing) -> Self {
        self.insert(model, pricing);
        self
    }

    pub fn insert(&mut self, model: impl Into<String>, pricing: ModelPricing) {
        self.entries.insert(model.into(), pricing);
    }

    /// Overlay `other` on top of this table.
    pub fn merge(&mut self, other: PricingTable) {
        self.entries.extend(other.entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn lookup(&self, model: &ModelId) -> PriceLookup {
        let id = model.as_str();
        if let Some(pricing) = self.entries.get(id) {
            return PriceLookup {
                pricing: *pricing,
                known: true,
            };
        }
        self.entries
            .iter()
            .filter(|(key, _)| id.starts_with(key.as_str()))
            .max_by_key(|(key, _)| key.len())
            .map(|(_, pricing)| PriceLookup {
                pricing: *pricing,
                known: true,
            })
            .unwrap_or(PriceLookup {
                pricing: FALLBACK_PRICING,
                known: false,
            })
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::empty()
            .with("claude-opus", ModelPricing::new(15.0, 75.0))
            .with("claude-sonnet", ModelPricing::new(3.0, 15.0))
            .with("claude-haiku", ModelPricing::new(0.8, 4.0))
            .with("gpt-4o-mini", ModelPricing::new(0.15, 0.6))
            .with("gpt-4o", ModelPricing::new(2.5, 10.0))
            .with("gpt-5", ModelPricing::new(1.25, 10.0))
            .with("gemini", ModelPricing::new(1.25, 10.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cost_formula() {
        let pricing = ModelPricing::new(3.0, 15.0);
        let cost = pricing.cost_of(&TokenUsage::new(1_000_000, 100_000));
        assert!((cost - 4.5).abs() < 1e-9);
    }

    #[test]
    fn test_exact_and_prefix_lookup() {
        let table = PricingTable::default();
        let exact = table.lookup(&ModelId::from("gpt-4o"));
        assert!(exact.known);
        assert_eq!(exact.pricing.input_per_million, 2.5);

        // Longest prefix wins: gpt-4o-mini over gpt-4o
        let mini = table.lookup(&ModelId::from("gpt-4o-mini-2024"));
        assert_eq!(mini.pricing.input_per_million, 0.15);

        let sonnet = table.lookup(&ModelId::from("claude-sonnet-4.5"));
        assert_eq!(sonnet.pricing.output_per_million, 15.0);
    }

    #[test]
    fn test_unknown_model_uses_fallback() {
        let lookup = PricingTable::empty().lookup(&ModelId::from("mystery"));
        assert!(!lookup.known);
        assert_eq!(lookup.pricing, FALLBACK_PRICING);
    }

    #[test]
    fn test_merge_overrides() {
        let mut table = PricingTable::default();
        table.merge(PricingTable::empty().with("gpt-4o", ModelPricing::new(1.0, 2.0)));
        assert_eq!(
            table.lookup(&ModelId::from("gpt-4o")).pricing,
            ModelPricing::new(1.0, 2.0)
        );
    }
}
