//! Model pricing used to attribute spend to channels.
//!
//! Prices are in USD per 1 million tokens. The table is built once at startup
//! from the built-in list plus `[telemetry.custom_pricing]` and is read-only
//! afterwards.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-million-token pricing for a model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input_per_m: f64,
    pub output_per_m: f64,
}

impl ModelPricing {
    pub const fn new(input_per_m: f64, output_per_m: f64) -> Self {
        Self {
            input_per_m,
            output_per_m,
        }
    }

    /// Compute cost for the given token counts.
    pub fn cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        (input_tokens as f64 * self.input_per_m + output_tokens as f64 * self.output_per_m)
            / 1_000_000.0
    }
}

/// Models commonly used for short structured planning calls.
const BUILTIN: &[(&str, ModelPricing)] = &[
    ("openai/gpt-4o", ModelPricing::new(2.5, 10.0)),
    ("openai/gpt-4o-mini", ModelPricing::new(0.15, 0.6)),
    ("openai/gpt-4.1", ModelPricing::new(2.0, 8.0)),
    ("openai/gpt-4.1-mini", ModelPricing::new(0.4, 1.6)),
    ("openai/gpt-4.1-nano", ModelPricing::new(0.1, 0.4)),
    ("openai/gpt-5", ModelPricing::new(1.25, 10.0)),
    ("openai/gpt-5-mini", ModelPricing::new(0.25, 2.0)),
    ("openai/gpt-5-nano", ModelPricing::new(0.05, 0.4)),
    ("openai/o3-mini", ModelPricing::new(1.1, 4.4)),
    ("anthropic/claude-sonnet-4", ModelPricing::new(3.0, 15.0)),
    ("anthropic/claude-3.5-haiku", ModelPricing::new(0.8, 4.0)),
    ("google/gemini-2.0-flash", ModelPricing::new(0.1, 0.4)),
    ("mistral/mistral-small", ModelPricing::new(0.2, 0.6)),
    ("deepseek/deepseek-v3", ModelPricing::new(0.27, 1.1)),
];

/// Immutable lookup table from model name to pricing.
#[derive(Debug, Clone)]
pub struct PricingTable {
    prices: HashMap<String, ModelPricing>,
}

impl PricingTable {
    /// Built-in prices only.
    pub fn with_defaults() -> Self {
        Self {
            prices: BUILTIN
                .iter()
                .map(|(name, p)| (name.to_string(), *p))
                .collect(),
        }
    }

    /// Built-in prices with custom entries layered on top.
    pub fn with_overrides(overrides: impl IntoIterator<Item = (String, ModelPricing)>) -> Self {
        let mut table = Self::with_defaults();
        table.prices.extend(overrides);
        table
    }

    pub fn empty() -> Self {
        Self {
            prices: HashMap::new(),
        }
    }

    pub fn get(&self, model: &str) -> Option<ModelPricing> {
        self.prices.get(model).copied()
    }

    /// Resolve the pricing for a model name as reported by a provider.
    ///
    /// Tries an exact match, then the bare name without provider prefix, then
    /// the longest known bare name that prefixes the reported one (providers
    /// append date suffixes such as `gpt-4o-mini-2024-07-18`).
    pub fn resolve(&self, model: &str) -> Option<ModelPricing> {
        if let Some(p) = self.prices.get(model) {
            return Some(*p);
        }

        let wanted = bare_name(model).to_lowercase();
        self.prices
            .iter()
            .map(|(key, p)| (bare_name(key).to_lowercase(), p))
            .filter(|(bare, _)| wanted.starts_with(bare.as_str()))
            .max_by_key(|(bare, _)| bare.len())
            .map(|(_, p)| *p)
    }

    /// Cost of one call; 0.0 for unknown models.
    pub fn compute_cost(&self, model: &str, input_tokens: u32, output_tokens: u32) -> f64 {
        self.resolve(model)
            .map(|p| p.cost(input_tokens, output_tokens))
            .unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn bare_name(model: &str) -> &str {
    model.rsplit('/').next().unwrap_or(model)
}
