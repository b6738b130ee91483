//! Thread-safe per-channel usage ledger.
//!
//! Counts observed messages (human vs. bot) and attributes model spend to
//! the channel that triggered it. This is the in-process implementation of
//! the scorer's metrics collaborator.

use std::collections::HashMap;
use std::sync::RwLock;

use banter_core::channel::ChannelKey;
use banter_core::metrics::{ChannelMetrics, CostTotals, MetricsProvider, UsageRecorder};
use banter_core::provider::Usage;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::pricing::PricingTable;

/// Everything the ledger knows about one channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChannelUsage {
    pub total_messages: u64,
    pub bot_messages: u64,
    pub last_activity: Option<DateTime<Utc>>,
    pub total_cost_usd: f64,
    pub total_calls: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Totals across all channels.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LedgerSummary {
    pub channels: usize,
    pub total_messages: u64,
    pub total_cost_usd: f64,
    pub total_calls: u64,
}

pub struct UsageLedger {
    pricing: PricingTable,
    channels: RwLock<HashMap<ChannelKey, ChannelUsage>>,
}

impl UsageLedger {
    pub fn new(pricing: PricingTable) -> Self {
        Self {
            pricing,
            channels: RwLock::new(HashMap::new()),
        }
    }

    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }

    /// Count one observed chat message.
    pub fn record_message(&self, channel: &ChannelKey, is_bot: bool, at: DateTime<Utc>) {
        let mut channels = self.channels.write().unwrap_or_else(|e| e.into_inner());
        let entry = channels.entry(channel.clone()).or_default();
        entry.total_messages += 1;
        if is_bot {
            entry.bot_messages += 1;
        }
        entry.last_activity = Some(entry.last_activity.map_or(at, |prev| prev.max(at)));
    }

    pub fn channel(&self, channel: &ChannelKey) -> Option<ChannelUsage> {
        self.channels
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(channel)
            .cloned()
    }

    pub fn summary(&self) -> LedgerSummary {
        let channels = self.channels.read().unwrap_or_else(|e| e.into_inner());
        channels.values().fold(
            LedgerSummary {
                channels: channels.len(),
                ..Default::default()
            },
            |mut acc, c| {
                acc.total_messages += c.total_messages;
                acc.total_cost_usd += c.total_cost_usd;
                acc.total_calls += c.total_calls;
                acc
            },
        )
    }

    /// Drop channels with no activity since `cutoff`. Returns how many went.
    pub fn prune_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut channels = self.channels.write().unwrap_or_else(|e| e.into_inner());
        let before = channels.len();
        channels.retain(|_, c| c.last_activity.is_some_and(|t| t >= cutoff));
        before - channels.len()
    }
}

impl Default for UsageLedger {
    fn default() -> Self {
        Self::new(PricingTable::with_defaults())
    }
}

impl MetricsProvider for UsageLedger {
    fn channel_metrics(&self, channel: &ChannelKey) -> Option<ChannelMetrics> {
        self.channel(channel)
            .filter(|c| c.total_messages > 0)
            .map(|c| ChannelMetrics {
                total_messages: c.total_messages,
                bot_messages: c.bot_messages,
                last_activity: c.last_activity,
            })
    }

    fn cost_totals(&self, channel: &ChannelKey) -> Option<CostTotals> {
        self.channel(channel)
            .filter(|c| c.total_calls > 0)
            .map(|c| CostTotals {
                total_cost_usd: c.total_cost_usd,
                total_calls: c.total_calls,
            })
    }

    /// Idleness is measured against the newest message the ledger has seen,
    /// so replayed transcripts age by their own timestamps.
    fn prune_idle(&self, max_idle: std::time::Duration) -> usize {
        let newest = self
            .channels
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter_map(|c| c.last_activity)
            .max();
        let (Some(newest), Ok(max_idle)) = (newest, chrono::Duration::from_std(max_idle)) else {
            return 0;
        };
        let pruned = self.prune_before(newest - max_idle);
        if pruned > 0 {
            debug!(pruned, "Pruned idle ledger channels");
        }
        pruned
    }
}

impl UsageRecorder for UsageLedger {
    fn record_model_call(&self, channel: &ChannelKey, model: &str, usage: &Usage) {
        let cost = self
            .pricing
            .compute_cost(model, usage.prompt_tokens, usage.completion_tokens);
        debug!(channel = %channel, model, cost_usd = cost, "Recorded model call");

        let mut channels = self.channels.write().unwrap_or_else(|e| e.into_inner());
        let entry = channels.entry(channel.clone()).or_default();
        entry.total_calls += 1;
        entry.total_cost_usd += cost;
        entry.input_tokens += u64::from(usage.prompt_tokens);
        entry.output_tokens += u64::from(usage.completion_tokens);
    }
}
