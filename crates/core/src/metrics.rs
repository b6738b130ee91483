//! Metrics collaborator traits.
//!
//! The scorer reads channel activity and spend through [`MetricsProvider`];
//! the planner reports model usage through [`UsageRecorder`]. Both may be
//! backed by the same ledger, or by an external service whose numbers are
//! stale or missing, so every read returns an `Option`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::channel::ChannelKey;
use crate::provider::Usage;

/// Message counts observed in a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelMetrics {
    pub total_messages: u64,
    pub bot_messages: u64,
    pub last_activity: Option<DateTime<Utc>>,
}

/// Model spend attributed to a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostTotals {
    pub total_cost_usd: f64,
    pub total_calls: u64,
}

/// Read-only view of per-channel activity and spend.
pub trait MetricsProvider: Send + Sync {
    fn channel_metrics(&self, channel: &ChannelKey) -> Option<ChannelMetrics>;

    fn cost_totals(&self, channel: &ChannelKey) -> Option<CostTotals>;

    /// Forget channels quiet for longer than `max_idle`. Returns how many
    /// went. Providers that hold no state keep the default.
    fn prune_idle(&self, _max_idle: Duration) -> usize {
        0
    }
}

/// Sink for model-call accounting.
pub trait UsageRecorder: Send + Sync {
    fn record_model_call(&self, channel: &ChannelKey, model: &str, usage: &Usage);
}

/// A metrics provider that knows nothing.
///
/// Used when no ledger is wired in; the scorer falls back to its neutral
/// defaults for every metrics-derived signal.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMetrics;

impl MetricsProvider for NoMetrics {
    fn channel_metrics(&self, _channel: &ChannelKey) -> Option<ChannelMetrics> {
        None
    }

    fn cost_totals(&self, _channel: &ChannelKey) -> Option<CostTotals> {
        None
    }
}
