//! Cost tracking for Banter.
//!
//! Provides the per-channel [`UsageLedger`] (message counts and model spend)
//! that feeds the engagement scorer's cost and activity signals, and the
//! [`PricingTable`] used to turn token usage into USD.

pub mod ledger;
pub mod pricing;

pub use ledger::{ChannelUsage, LedgerSummary, UsageLedger};
pub use pricing::{ModelPricing, PricingTable};

/// Build a ledger whose pricing includes `[telemetry.custom_pricing]`.
pub fn ledger_from_config(config: &banter_config::TelemetryConfig) -> UsageLedger {
    let overrides = config.custom_pricing.iter().map(|(model, p)| {
        (
            model.clone(),
            ModelPricing::new(p.input_per_m, p.output_per_m),
        )
    });
    UsageLedger::new(PricingTable::with_overrides(overrides))
}
