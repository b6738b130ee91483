//! Weighted multi-signal engagement scoring.
//!
//! Six signals, each in `[0, 1]`, are combined with per-channel weights into
//! one score. The scorer is pure: it reads the context and never mutates it.
//! Internal errors fail open (engage, score 0.5) so a scoring bug never
//! silences the agent.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use banter_config::{EngagementPreferences, EngagementWeights};
use banter_core::error::ScoreError;
use serde::Serialize;
use regex_lite::Regex;
use tracing::{debug, warn};

use crate::context::{EngagementContext, word_pattern};

/// Score assumed when scoring itself fails.
pub const FAIL_OPEN_SCORE: f64 = 0.5;

/// Contractions such as "what's" match through the bare word.
const INTERROGATIVES: &[&str] = &[
    "who", "what", "when", "where", "why", "how", "which", "whose", "whom", "whats", "hows",
    "wdyt",
];

const QUESTION_PHRASES: &[&str] = &[
    "does anyone",
    "does anybody",
    "anyone know",
    "anybody know",
    "can someone",
    "can anyone",
    "can you",
    "could you",
    "would you",
    "how do i",
    "how do you",
    "how can i",
    "is there a way",
    "any idea",
    "any ideas",
    "what do you think",
    "help me",
    "wondering if",
];

static INTERROGATIVE_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| word_pattern(INTERROGATIVES.iter().copied()));
static QUESTION_PHRASE_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| word_pattern(QUESTION_PHRASES.iter().copied()));

const TECHNICAL_KEYWORDS: &[&str] = &[
    "api", "async", "bug", "build", "cargo", "compile", "config", "database", "debug", "deploy",
    "docker", "error", "exception", "function", "git", "http", "json", "kubernetes", "linux",
    "python", "query", "regex", "rust", "server", "sql", "stack trace", "typescript",
];

/// Spend rate (USD/minute) at which the cost signal saturates.
const COST_REFERENCE_USD_PER_MIN: f64 = 0.10;
/// Share of the channel's total spend assumed to fall in the recent window.
const RECENT_SPEND_SHARE: f64 = 0.1;
const RECENT_WINDOW_MINUTES: f64 = 5.0;

/// Optional adjustment for scores near the decision boundary.
#[async_trait]
pub trait ScoreRefiner: Send + Sync {
    /// Return an adjusted score; values outside `[0, 1]` are clamped.
    async fn refine(&self, context: &EngagementContext, score: f64) -> f64;
}

/// Leaves the score untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThroughRefiner;

#[async_trait]
impl ScoreRefiner for PassThroughRefiner {
    async fn refine(&self, _context: &EngagementContext, score: f64) -> f64 {
        score
    }
}

/// One signal's share of the final score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalContribution {
    pub signal: &'static str,
    pub value: f64,
    pub weight: f64,
    pub contribution: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngagementDecision {
    pub engage: bool,
    pub score: f64,
    /// One-line summary
    pub reason: String,
    /// Human-readable reasons for each notable contribution
    pub reasons: Vec<String>,
    pub breakdown: Vec<SignalContribution>,
}

impl EngagementDecision {
    fn fail_open(error: &ScoreError) -> Self {
        Self {
            engage: true,
            score: FAIL_OPEN_SCORE,
            reason: format!("scoring failed ({error}); engaging by default"),
            reasons: vec![],
            breakdown: vec![],
        }
    }
}

pub struct EngagementScorer {
    refiner: Arc<dyn ScoreRefiner>,
}

impl Default for EngagementScorer {
    fn default() -> Self {
        Self::new(Arc::new(PassThroughRefiner))
    }
}

impl EngagementScorer {
    pub fn new(refiner: Arc<dyn ScoreRefiner>) -> Self {
        Self { refiner }
    }

    pub async fn decide(
        &self,
        context: &EngagementContext,
        weights: &EngagementWeights,
        preferences: &EngagementPreferences,
    ) -> EngagementDecision {
        match self.try_decide(context, weights, preferences).await {
            Ok(decision) => {
                debug!(
                    channel = %context.channel_key,
                    score = decision.score,
                    engage = decision.engage,
                    "Engagement decided"
                );
                decision
            }
            Err(e) => {
                warn!(channel = %context.channel_key, error = %e, "Scoring failed, failing open");
                EngagementDecision::fail_open(&e)
            }
        }
    }

    async fn try_decide(
        &self,
        context: &EngagementContext,
        weights: &EngagementWeights,
        preferences: &EngagementPreferences,
    ) -> Result<EngagementDecision, ScoreError> {
        let values = signal_values(context);
        let mut breakdown = Vec::with_capacity(values.len());
        let mut reasons = Vec::new();
        let mut score = 0.0;

        for ((signal, weight), (_, value)) in weights.entries().into_iter().zip(values) {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ScoreError::InvalidWeight {
                    signal,
                    value: weight,
                });
            }
            if !value.is_finite() {
                return Err(ScoreError::NonFinite { signal });
            }
            let contribution = value * weight;
            if let Some(reason) = describe(signal, value, contribution) {
                reasons.push(reason);
            }
            score += contribution;
            breakdown.push(SignalContribution {
                signal,
                value,
                weight,
                contribution,
            });
        }

        if context.is_dm {
            score = (score * preferences.dm_boost).min(1.0);
            reasons.push(format!("direct message (x{:.2})", preferences.dm_boost));
        }

        if preferences.enable_refinement && preferences.probabilistic_band.contains(score) {
            let refined = self.refiner.refine(context, score).await;
            if refined.is_finite() {
                debug!(before = score, after = refined, "Score refined");
                score = refined;
            }
        }

        let score = score.clamp(0.0, 1.0);
        let engage = score >= preferences.min_engage_threshold;
        let reason = format!(
            "score {:.2} {} threshold {:.2}",
            score,
            if engage { "meets" } else { "below" },
            preferences.min_engage_threshold
        );

        Ok(EngagementDecision {
            engage,
            score,
            reason,
            reasons,
            breakdown,
        })
    }
}

/// Raw signal values in the same order as [`EngagementWeights::entries`].
pub fn signal_values(context: &EngagementContext) -> [(&'static str, f64); 6] {
    [
        ("mention", mention_signal(context)),
        ("question", question_signal(&context.message.content)),
        ("technical", technical_signal(&context.message.content)),
        ("human_activity", human_activity_signal(context)),
        ("cost_saturation", cost_saturation_signal(context)),
        ("bot_noise", bot_noise_signal(context)),
    ]
}

fn mention_signal(context: &EngagementContext) -> f64 {
    if context.agent.is_directly_addressed(&context.message) {
        1.0
    } else if context.agent.is_named_in(&context.message.content) {
        0.9
    } else {
        0.0
    }
}

pub(crate) fn question_signal(text: &str) -> f64 {
    let marks = text.matches('?').count() as f64;
    let mut raw = (0.2 * marks).min(0.5);

    if matches_any(&INTERROGATIVE_PATTERN, text) {
        raw += 0.3;
    }
    if matches_any(&QUESTION_PHRASE_PATTERN, text) {
        raw += 0.4;
    }
    (raw / 1.2).min(1.0)
}

fn matches_any(pattern: &LazyLock<Option<Regex>>, text: &str) -> bool {
    pattern.as_ref().is_some_and(|re| re.is_match(text))
}

pub(crate) fn technical_signal(text: &str) -> f64 {
    let lower = text.to_lowercase();
    let matched = TECHNICAL_KEYWORDS
        .iter()
        .filter(|k| lower.contains(*k))
        .count();
    matched as f64 / TECHNICAL_KEYWORDS.len() as f64
}

fn human_activity_signal(context: &EngagementContext) -> f64 {
    match &context.metrics {
        Some(m) if m.total_messages > 0 => {
            let humans = m.total_messages.saturating_sub(m.bot_messages);
            humans as f64 / m.total_messages as f64
        }
        _ => 0.5,
    }
}

fn cost_saturation_signal(context: &EngagementContext) -> f64 {
    match &context.costs {
        Some(c) => {
            let velocity = c.total_cost_usd * RECENT_SPEND_SHARE / RECENT_WINDOW_MINUTES;
            let saturation = (velocity / COST_REFERENCE_USD_PER_MIN).clamp(0.0, 1.0);
            1.0 - saturation
        }
        None => 0.0,
    }
}

fn bot_noise_signal(context: &EngagementContext) -> f64 {
    match &context.metrics {
        Some(m) if m.total_messages > 0 => {
            let bots = m.bot_messages.min(m.total_messages);
            1.0 - bots as f64 / m.total_messages as f64
        }
        _ => 0.0,
    }
}

fn describe(signal: &str, value: f64, contribution: f64) -> Option<String> {
    let (threshold, text) = match signal {
        "mention" if value >= 1.0 => (0.0, "addressed directly"),
        "mention" => (0.0, "agent named in text"),
        "question" => (0.05, "looks like a question"),
        "technical" => (0.005, "technical topic"),
        "human_activity" => (0.075, "mostly humans talking"),
        "cost_saturation" => (0.05, "spend is well under budget"),
        "bot_noise" => (0.05, "little bot noise"),
        _ => return None,
    };
    (contribution > threshold).then(|| format!("{text} (+{contribution:.3})"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::AgentIdentity;
    use banter_config::ProbabilisticBand;
    use banter_core::channel::{Author, ChannelLocation, ChatMessage};
    use banter_core::metrics::{ChannelMetrics, CostTotals};

    fn context(content: &str) -> EngagementContext {
        let message = ChatMessage {
            id: "m".into(),
            author: Author {
                id: "u1".into(),
                name: "alice".into(),
                is_bot: false,
            },
            location: ChannelLocation::guild("g", "c"),
            content: content.into(),
            mentions: vec![],
            reply_to: None,
            timestamp: chrono::Utc::now(),
        };
        EngagementContext {
            channel_key: message.channel_key(),
            message,
            recent: vec![],
            metrics: None,
            costs: None,
            is_dm: false,
            agent: AgentIdentity::new("agent", vec!["banter".into()]),
        }
    }

    /// Mentioned, every other signal zero.
    fn mention_only() -> EngagementContext {
        let mut ctx = context("hey there");
        ctx.message.mentions = vec!["agent".into()];
        ctx.metrics = Some(ChannelMetrics {
            total_messages: 10,
            bot_messages: 10,
            last_activity: None,
        });
        ctx
    }

    fn value(decision: &EngagementDecision, signal: &str) -> f64 {
        decision
            .breakdown
            .iter()
            .find(|c| c.signal == signal)
            .map(|c| c.value)
            .unwrap()
    }

    #[tokio::test]
    async fn mention_alone_scores_its_weight() {
        let decision = EngagementScorer::default()
            .decide(
                &mention_only(),
                &EngagementWeights::default(),
                &EngagementPreferences::default(),
            )
            .await;
        assert!((decision.score - 0.3).abs() < 1e-9);
        assert!(!decision.engage);
        assert_eq!(decision.breakdown.len(), 6);
        assert!(decision.reasons.iter().any(|r| r.contains("addressed directly")));
    }

    #[tokio::test]
    async fn decide_is_deterministic() {
        let ctx = context("how do I fix this rust compile error?");
        let scorer = EngagementScorer::default();
        let weights = EngagementWeights::default();
        let prefs = EngagementPreferences::default();
        let a = scorer.decide(&ctx, &weights, &prefs).await;
        let b = scorer.decide(&ctx, &weights, &prefs).await;
        assert_eq!(a, b);
    }

    #[test]
    fn question_signal_components() {
        assert_eq!(question_signal("just chatting"), 0.0);
        // one '?' only
        assert!((question_signal("really?") - 0.2 / 1.2).abs() < 1e-9);
        // marks capped at 0.5, interrogative, phrase: 1.2 / 1.2
        assert!((question_signal("how do i do this??? what???") - 1.0).abs() < 1e-9);
        assert!((question_signal("what's up") - 0.3 / 1.2).abs() < 1e-9);
    }

    #[test]
    fn question_words_match_whole_words_only() {
        assert!((question_signal("What’s the plan") - 0.3 / 1.2).abs() < 1e-9);
        assert!((question_signal("Does  Anyone use nix") - 0.4 / 1.2).abs() < 1e-9);
        assert_eq!(question_signal("somehow whatever"), 0.0);
    }

    #[test]
    fn technical_signal_is_fraction_of_list() {
        assert_eq!(technical_signal("nice weather"), 0.0);
        let two = technical_signal("Docker keeps throwing an ERROR");
        assert!((two - 2.0 / TECHNICAL_KEYWORDS.len() as f64).abs() < 1e-9);
    }

    #[tokio::test]
    async fn named_in_text_scores_point_nine() {
        let decision = EngagementScorer::default()
            .decide(
                &context("banter would know"),
                &EngagementWeights::default(),
                &EngagementPreferences::default(),
            )
            .await;
        assert!((value(&decision, "mention") - 0.9).abs() < 1e-9);
    }

    #[tokio::test]
    async fn metrics_defaults_when_absent() {
        let decision = EngagementScorer::default()
            .decide(
                &context("hello"),
                &EngagementWeights::default(),
                &EngagementPreferences::default(),
            )
            .await;
        assert_eq!(value(&decision, "human_activity"), 0.5);
        assert_eq!(value(&decision, "cost_saturation"), 0.0);
        assert_eq!(value(&decision, "bot_noise"), 0.0);
    }

    #[tokio::test]
    async fn cost_saturation_falls_with_spend() {
        let mut ctx = context("hello");
        // 2.50 * 0.1 / 5 = 0.05 USD/min -> saturation 0.5
        ctx.costs = Some(CostTotals {
            total_cost_usd: 2.5,
            total_calls: 10,
        });
        let decision = EngagementScorer::default()
            .decide(&ctx, &EngagementWeights::default(), &EngagementPreferences::default())
            .await;
        assert!((value(&decision, "cost_saturation") - 0.5).abs() < 1e-9);

        ctx.costs = Some(CostTotals {
            total_cost_usd: 100.0,
            total_calls: 400,
        });
        let decision = EngagementScorer::default()
            .decide(&ctx, &EngagementWeights::default(), &EngagementPreferences::default())
            .await;
        assert_eq!(value(&decision, "cost_saturation"), 0.0);
    }

    #[tokio::test]
    async fn human_and_bot_ratios() {
        let mut ctx = context("hello");
        ctx.metrics = Some(ChannelMetrics {
            total_messages: 8,
            bot_messages: 2,
            last_activity: None,
        });
        let decision = EngagementScorer::default()
            .decide(&ctx, &EngagementWeights::default(), &EngagementPreferences::default())
            .await;
        assert!((value(&decision, "human_activity") - 0.75).abs() < 1e-9);
        assert!((value(&decision, "bot_noise") - 0.75).abs() < 1e-9);
    }

    #[tokio::test]
    async fn dm_boost_is_clamped() {
        let mut ctx = mention_only();
        ctx.is_dm = true;
        let prefs = EngagementPreferences {
            dm_boost: 10.0,
            ..Default::default()
        };
        let decision = EngagementScorer::default()
            .decide(&ctx, &EngagementWeights::default(), &prefs)
            .await;
        assert_eq!(decision.score, 1.0);
        assert!(decision.engage);
    }

    #[tokio::test]
    async fn invalid_weight_fails_open() {
        let weights = EngagementWeights {
            question: f64::NAN,
            ..Default::default()
        };
        let decision = EngagementScorer::default()
            .decide(&context("hello"), &weights, &EngagementPreferences::default())
            .await;
        assert!(decision.engage);
        assert_eq!(decision.score, FAIL_OPEN_SCORE);
        assert!(decision.breakdown.is_empty());
    }

    struct FixedRefiner(f64);

    #[async_trait]
    impl ScoreRefiner for FixedRefiner {
        async fn refine(&self, _context: &EngagementContext, _score: f64) -> f64 {
            self.0
        }
    }

    fn band_prefs(enable_refinement: bool) -> EngagementPreferences {
        EngagementPreferences {
            enable_refinement,
            probabilistic_band: ProbabilisticBand {
                low: 0.2,
                high: 0.4,
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn refiner_runs_inside_band_and_is_clamped() {
        let scorer = EngagementScorer::new(Arc::new(FixedRefiner(7.0)));
        let decision = scorer
            .decide(&mention_only(), &EngagementWeights::default(), &band_prefs(true))
            .await;
        assert_eq!(decision.score, 1.0);
        assert!(decision.engage);
    }

    #[tokio::test]
    async fn refiner_skipped_when_disabled() {
        let scorer = EngagementScorer::new(Arc::new(FixedRefiner(1.0)));
        let decision = scorer
            .decide(&mention_only(), &EngagementWeights::default(), &band_prefs(false))
            .await;
        assert!((decision.score - 0.3).abs() < 1e-9);
    }

    #[tokio::test]
    async fn scoring_does_not_touch_context() {
        let ctx = mention_only();
        let before = format!("{ctx:?}");
        EngagementScorer::default()
            .decide(&ctx, &EngagementWeights::default(), &EngagementPreferences::default())
            .await;
        assert_eq!(before, format!("{ctx:?}"));
    }
}
