//! `banter replay`: run a recorded transcript through the pipeline.
//!
//! The transcript is JSONL, one [`ChatMessage`] per line. Every message is
//! counted into the usage ledger, handed to the pipeline with its channel's
//! recent history, and the outcome is printed to stdout as one JSON line.
//! Plans are not delivered anywhere; the executor and transport only log.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use banter_config::AppConfig;
use banter_core::channel::{ChannelKey, ChannelLocation, ChatMessage, ChatTransport};
use banter_core::error::{ProviderError, TransportError};
use banter_core::provider::{Provider, ProviderRequest, ProviderResponse};
use banter_engagement::{EngagementPipeline, PipelineOutcome, Plan, PlanExecutor};
use banter_telemetry::{UsageLedger, ledger_from_config};
use tracing::info;

use super::load_config;

pub async fn run(
    config_path: Option<&Path>,
    file: &Path,
    offline: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    let transcript = std::fs::read_to_string(file)
        .map_err(|e| format!("Failed to read {}: {e}", file.display()))?;
    let messages = parse_transcript(&transcript)?;

    let provider: Arc<dyn Provider> = if offline {
        Arc::new(OfflineProvider)
    } else {
        if !config.has_api_key() {
            return Err("No API key found. Set OPENROUTER_API_KEY or pass --offline.".into());
        }
        banter_providers::build_from_config(&config)
    };

    let ledger = Arc::new(ledger_from_config(&config.telemetry));
    let mut pipeline = EngagementPipeline::new(&config, provider, ledger.clone());
    if config.planner.record_usage {
        pipeline = pipeline.with_usage_recorder(ledger.clone());
    }
    let pipeline = Arc::new(pipeline);
    let maintenance = pipeline
        .clone()
        .spawn_maintenance(Duration::from_secs(config.maintenance.sweep_interval_secs));

    let outcomes = replay(&pipeline, &config, &messages, Some(ledger.as_ref()), |message, outcome| {
        let line = serde_json::json!({
            "message_id": message.id,
            "channel": message.channel_key(),
            "result": outcome,
        });
        println!("{line}");
    })
    .await;
    maintenance.abort();

    let summary = ledger.summary();
    info!(
        messages = messages.len(),
        planned = outcomes
            .iter()
            .filter(|o| matches!(o, PipelineOutcome::Planned { .. }))
            .count(),
        channels = summary.channels,
        model_calls = summary.total_calls,
        cost_usd = summary.total_cost_usd,
        "Replay finished"
    );
    Ok(())
}

/// Parse JSONL, skipping blank lines. Errors carry the 1-based line number.
pub fn parse_transcript(text: &str) -> Result<Vec<ChatMessage>, String> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|e| format!("Transcript line {}: {e}", i + 1))
        })
        .collect()
}

/// Feed `messages` through the pipeline in order, keeping a bounded history
/// per channel. Each message is counted into `ledger` before it is handled;
/// `observe` sees it again with its outcome.
async fn replay(
    pipeline: &EngagementPipeline,
    config: &AppConfig,
    messages: &[ChatMessage],
    ledger: Option<&UsageLedger>,
    mut observe: impl FnMut(&ChatMessage, &PipelineOutcome),
) -> Vec<PipelineOutcome> {
    let window = config.planner.history_window;
    let mut histories: HashMap<ChannelKey, VecDeque<ChatMessage>> = HashMap::new();
    let mut outcomes = Vec::with_capacity(messages.len());

    for message in messages {
        if let Some(ledger) = ledger {
            ledger.record_message(&message.channel_key(), message.author.is_bot, message.timestamp);
        }
        let history = histories.entry(message.channel_key()).or_default();
        let outcome = pipeline
            .process(message, history.make_contiguous(), &LoggingExecutor, &LoggingTransport)
            .await;
        observe(message, &outcome);

        history.push_back(message.clone());
        while history.len() > window {
            history.pop_front();
        }
        outcomes.push(outcome);
    }
    outcomes
}

// --- Offline collaborators ---

/// Refuses every request, so each plan takes the fallback path.
struct OfflineProvider;

#[async_trait]
impl Provider for OfflineProvider {
    fn name(&self) -> &str {
        "offline"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::NotConfigured("offline replay".into()))
    }
}

struct LoggingExecutor;

#[async_trait]
impl PlanExecutor for LoggingExecutor {
    async fn execute(&self, message: &ChatMessage, plan: &Plan) -> banter_core::Result<()> {
        info!(
            channel = %message.channel_key(),
            message_id = %message.id,
            action = plan.action.name(),
            modality = ?plan.modality,
            "Would execute plan"
        );
        Ok(())
    }
}

struct LoggingTransport;

#[async_trait]
impl ChatTransport for LoggingTransport {
    async fn send_message(
        &self,
        location: &ChannelLocation,
        content: &str,
        reply_to: Option<&str>,
    ) -> Result<(), TransportError> {
        info!(channel = %location.key(), reply_to, content, "Would send message");
        Ok(())
    }

    async fn react(
        &self,
        location: &ChannelLocation,
        message_id: &str,
        emoji: &str,
    ) -> Result<(), TransportError> {
        info!(channel = %location.key(), message_id, emoji, "Would react");
        Ok(())
    }
}
