//! Token and cost accounting.
//!
//! - [`pricing::PricingTable`]: injected per-model prices
//! - [`ledger::CostLedger`]: running totals and fired warnings
//! - [`accountant::CostAccountant`]: records usage and checks tiers

pub mod accountant;
pub mod ledger;
pub mod pricing;

pub use accountant::CostAccountant;
pub use ledger::{CostLedger, CostRecord, CostSnapshot, CostThresholds, CostTier, CostWarning};
pub use pricing::{ModelPricing, PricingTable};
