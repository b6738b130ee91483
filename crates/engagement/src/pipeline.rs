//! The per-message engagement state machine.
//!
//! ```text
//! message ─► thread allowed? ─► own message? ─► bot loop? ─► rate limit
//!        ─► classify ─► mention/reply ──────────────► plan ─► execute
//!                    └► catch-up ─► score ─► engage? ─► plan ─► execute
//!                    └► none ─► drop
//! ```
//!
//! Messages in the same channel are handled strictly one at a time
//! ([`ChannelLocks`]); different channels run fully in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use banter_config::{AppConfig, EngagementConfig};
use banter_core::channel::{ChannelKey, ChatMessage, ChatTransport};
use banter_core::metrics::{MetricsProvider, UsageRecorder};
use banter_core::provider::Provider;
use serde::Serialize;
use tokio::sync::OwnedMutexGuard;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::activity::{ActivityTracker, Trigger};
use crate::context::{AgentIdentity, EngagementContext};
use crate::plan::Plan;
use crate::planner::{PlanGenerator, PlanSource, TriggerReason};
use crate::rate_limit::{RateScope, ScopedRateLimiter};
use crate::scorer::{EngagementDecision, EngagementScorer, ScoreRefiner};

/// Carries out a validated plan (reply, reaction, image, voice).
#[async_trait]
pub trait PlanExecutor: Send + Sync {
    async fn execute(&self, message: &ChatMessage, plan: &Plan) -> banter_core::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    DisallowedThread,
    OwnMessage,
    NoTrigger,
}

/// What the pipeline decided for one message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PipelineOutcome {
    Dropped {
        reason: DropReason,
    },
    /// Another bot is looping with the agent
    Suppressed {
        reaction: Option<String>,
    },
    RateLimited {
        scope: RateScope,
        retry_after_secs: u64,
    },
    /// Catch-up trigger scored below the threshold
    Declined {
        decision: EngagementDecision,
    },
    Planned {
        trigger: Trigger,
        plan: Plan,
        source: PlanSource,
        #[serde(skip_serializing_if = "Option::is_none")]
        decision: Option<EngagementDecision>,
    },
}

/// Counts from one maintenance pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepStats {
    pub counters: usize,
    pub bot_conversations: usize,
    pub rate_limit_scopes: usize,
    pub channel_locks: usize,
    pub metrics_channels: usize,
}

/// One async mutex per channel key.
#[derive(Default)]
pub struct ChannelLocks {
    locks: Mutex<HashMap<ChannelKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl ChannelLocks {
    pub async fn lock(&self, key: &ChannelKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(key.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Forget locks nobody holds or waits on.
    pub fn prune(&self) -> usize {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        let before = locks.len();
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        before - locks.len()
    }

    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct EngagementPipeline {
    agent: AgentIdentity,
    engagement: EngagementConfig,
    apology: String,
    tracker: ActivityTracker,
    limiter: ScopedRateLimiter,
    scorer: EngagementScorer,
    planner: PlanGenerator,
    metrics: Arc<dyn MetricsProvider>,
    metrics_ttl: Duration,
    locks: ChannelLocks,
}

impl EngagementPipeline {
    pub fn new(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        metrics: Arc<dyn MetricsProvider>,
    ) -> Self {
        let agent = AgentIdentity::from_config(&config.agent);
        Self {
            tracker: ActivityTracker::new(agent.clone(), &config.activity, &config.bot_interaction),
            limiter: ScopedRateLimiter::new(&config.rate_limits),
            scorer: EngagementScorer::default(),
            planner: PlanGenerator::new(provider, config.model.clone(), &config.planner),
            engagement: config.engagement.clone(),
            apology: config.planner.apology.clone(),
            agent,
            metrics,
            metrics_ttl: Duration::from_secs(config.telemetry.channel_ttl_secs),
            locks: ChannelLocks::default(),
        }
    }

    pub fn with_refiner(mut self, refiner: Arc<dyn ScoreRefiner>) -> Self {
        self.scorer = EngagementScorer::new(refiner);
        self
    }

    pub fn with_usage_recorder(mut self, recorder: Arc<dyn UsageRecorder>) -> Self {
        self.planner = self.planner.with_usage_recorder(recorder);
        self
    }

    pub fn tracker(&self) -> &ActivityTracker {
        &self.tracker
    }

    pub fn agent(&self) -> &AgentIdentity {
        &self.agent
    }

    /// Decide what to do with `message`, without executing anything.
    ///
    /// `history` is the bounded window of messages that preceded it.
    pub async fn handle(&self, message: &ChatMessage, history: &[ChatMessage]) -> PipelineOutcome {
        let _guard = self.locks.lock(&message.channel_key()).await;
        self.decide(message, history).await
    }

    /// Decide and carry out the outcome.
    ///
    /// Execution failures never escape: they are logged and the user gets
    /// the configured apology instead.
    pub async fn process(
        &self,
        message: &ChatMessage,
        history: &[ChatMessage],
        executor: &dyn PlanExecutor,
        transport: &dyn ChatTransport,
    ) -> PipelineOutcome {
        let _guard = self.locks.lock(&message.channel_key()).await;
        let outcome = self.decide(message, history).await;

        match &outcome {
            PipelineOutcome::Suppressed {
                reaction: Some(emoji),
            } => {
                if let Err(e) = transport.react(&message.location, &message.id, emoji).await {
                    warn!(error = %e, "Failed to post cooldown reaction");
                }
            }
            PipelineOutcome::Planned {
                trigger, source, ..
            } if trigger.is_direct() && *source == PlanSource::Fallback => {
                self.apologize(message, transport).await;
            }
            PipelineOutcome::Planned { plan, .. } if plan.is_actionable() => {
                if let Err(e) = executor.execute(message, plan).await {
                    error!(
                        channel = %message.channel_key(),
                        action = plan.action.name(),
                        error = %e,
                        "Plan execution failed"
                    );
                    self.apologize(message, transport).await;
                }
            }
            _ => {}
        }

        outcome
    }

    async fn apologize(&self, message: &ChatMessage, transport: &dyn ChatTransport) {
        if let Err(e) = transport
            .send_message(&message.location, &self.apology, Some(&message.id))
            .await
        {
            error!(channel = %message.channel_key(), error = %e, "Failed to deliver apology");
        }
    }

    async fn decide(&self, message: &ChatMessage, history: &[ChatMessage]) -> PipelineOutcome {
        let channel_key = message.channel_key();

        if !self.tracker.is_thread_allowed(&message.location) {
            debug!(channel = %channel_key, "Message in disallowed thread");
            return PipelineOutcome::Dropped {
                reason: DropReason::DisallowedThread,
            };
        }

        if self.agent.is_self(&message.author.id) {
            self.tracker.on_bot_message_sent(&channel_key);
            return PipelineOutcome::Dropped {
                reason: DropReason::OwnMessage,
            };
        }

        if message.author.is_bot {
            let verdict = self.tracker.should_suppress_bot_loop(message);
            if verdict.suppressed {
                return PipelineOutcome::Suppressed {
                    reaction: verdict.reaction,
                };
            }
        } else {
            self.tracker.clear_bot_conversation(&channel_key);
        }

        if let Err((scope, verdict)) = self.limiter.check_message(message) {
            warn!(
                channel = %channel_key,
                author = %message.author.id,
                scope = ?scope,
                retry_after_secs = verdict.retry_after_secs,
                "Rate limit exceeded"
            );
            return PipelineOutcome::RateLimited {
                scope,
                retry_after_secs: verdict.retry_after_secs,
            };
        }

        let trigger = self.tracker.record_and_classify(message).trigger;
        match trigger {
            Trigger::None => PipelineOutcome::Dropped {
                reason: DropReason::NoTrigger,
            },
            Trigger::Mention | Trigger::Reply => {
                let context = self.context(message, history);
                let planned = self
                    .planner
                    .plan_with_source(&context, TriggerReason::DirectAddress)
                    .await;
                PipelineOutcome::Planned {
                    trigger,
                    plan: planned.plan,
                    source: planned.source,
                    decision: None,
                }
            }
            Trigger::Catchup => {
                let context = self.context(message, history);
                let (weights, preferences) = self.engagement.effective_for(channel_key.as_str());
                let decision = self.scorer.decide(&context, &weights, &preferences).await;
                if !decision.engage {
                    info!(channel = %channel_key, score = decision.score, "Catch-up declined");
                    return PipelineOutcome::Declined { decision };
                }
                let planned = self
                    .planner
                    .plan_with_source(&context, TriggerReason::Catchup)
                    .await;
                PipelineOutcome::Planned {
                    trigger,
                    plan: planned.plan,
                    source: planned.source,
                    decision: Some(decision),
                }
            }
        }
    }

    fn context(&self, message: &ChatMessage, history: &[ChatMessage]) -> EngagementContext {
        EngagementContext::new(message, history, self.metrics.as_ref(), &self.agent)
    }

    /// One maintenance pass over every cache.
    pub fn sweep(&self) -> SweepStats {
        let (counters, bot_conversations) = self.tracker.sweep();
        SweepStats {
            counters,
            bot_conversations,
            rate_limit_scopes: self.limiter.cleanup(),
            channel_locks: self.locks.prune(),
            metrics_channels: self.metrics.prune_idle(self.metrics_ttl),
        }
    }

    /// Run [`sweep`](Self::sweep) every `interval` on a background task.
    pub fn spawn_maintenance(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let stats = self.sweep();
                debug!(
                    counters = stats.counters,
                    bot_conversations = stats.bot_conversations,
                    rate_limit_scopes = stats.rate_limit_scopes,
                    channel_locks = stats.channel_locks,
                    metrics_channels = stats.metrics_channels,
                    "Maintenance sweep"
                );
            }
        })
    }
}
