//! # Banter Engagement
//!
//! Decides, for every incoming chat message, whether the agent should act and
//! how. The pieces, leaves first:
//!
//! - [`RateLimiter`] / [`ScopedRateLimiter`]: sliding-window counters per user, channel and guild
//! - [`ActivityTracker`]: catch-up counters and bot-loop suppression
//! - [`EngagementScorer`]: weighted multi-signal score gating catch-up replies
//! - [`PlanGenerator`]: forced function call to the model, validated into a [`Plan`]
//! - [`EngagementPipeline`]: the per-message state machine tying them together
//!
//! All per-channel state lives in [`TtlCache`]s owned by one pipeline; nothing
//! is global, so tests build isolated instances.

pub mod activity;
pub mod cache;
pub mod context;
pub mod pipeline;
pub mod plan;
pub mod planner;
pub mod rate_limit;
pub mod scorer;

pub use activity::{ActivityTracker, BotLoopVerdict, Classification, Trigger};
pub use cache::TtlCache;
pub use context::{AgentIdentity, EngagementContext};
pub use pipeline::{DropReason, EngagementPipeline, PipelineOutcome, PlanExecutor, SweepStats};
pub use plan::{Plan, PlanAction};
pub use planner::{PlanGenerator, PlanSource, PlannedResponse, TriggerReason};
pub use rate_limit::{RateLimitResult, RateLimiter, RateScope, ScopedRateLimiter};
pub use scorer::{EngagementDecision, EngagementScorer, PassThroughRefiner, ScoreRefiner};
