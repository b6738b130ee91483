//! Per-channel activity tracking.
//!
//! Two pieces of state per channel key, each in its own [`TtlCache`]:
//! a catch-up counter (messages since the agent last spoke) and the
//! bot-conversation state used to stop two agents replying to each other
//! forever.

use std::time::Duration;

use banter_config::{ActivityConfig, BotInteractionConfig};
use banter_core::channel::{ChannelKey, ChannelLocation, ChatMessage};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::cache::TtlCache;
use crate::context::AgentIdentity;

/// Why a message deserves a response, if it does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Mention,
    Reply,
    Catchup,
    None,
}

impl Trigger {
    pub fn is_direct(self) -> bool {
        matches!(self, Self::Mention | Self::Reply)
    }

    pub fn fired(self) -> bool {
        self != Self::None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub trigger: Trigger,
    pub channel_key: ChannelKey,
}

/// Outcome of the bot-loop check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BotLoopVerdict {
    pub suppressed: bool,
    /// Emoji to post once when a cooldown starts
    pub reaction: Option<String>,
}

impl BotLoopVerdict {
    fn allow() -> Self {
        Self::default()
    }

    fn suppress(reaction: Option<String>) -> Self {
        Self {
            suppressed: true,
            reaction,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// The agent spoke last
    SelfSent,
    /// The tracked bot spoke last
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotConversationState {
    pub tracked_bot_id: String,
    pub exchange_count: u32,
    pub last_direction: Direction,
    pub last_updated: Instant,
    pub blocked_until: Option<Instant>,
    cooldown_reaction_sent: bool,
}

impl BotConversationState {
    fn new(bot_id: &str, now: Instant) -> Self {
        Self {
            tracked_bot_id: bot_id.to_string(),
            exchange_count: 0,
            last_direction: Direction::Other,
            last_updated: now,
            blocked_until: None,
            cooldown_reaction_sent: false,
        }
    }

    /// A cooldown is still running at `now`.
    pub fn is_blocked_at(&self, now: Instant) -> bool {
        self.blocked_until.is_some_and(|until| now < until)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ChannelActivity {
    message_count: u32,
    last_updated: Instant,
}

pub struct ActivityTracker {
    agent: AgentIdentity,
    catchup_after: u32,
    catchup_if_named_after: u32,
    allowed_threads: Vec<String>,
    max_back_and_forth: u32,
    cooldown: Duration,
    cooldown_reaction: Option<String>,
    counters: TtlCache<ChannelKey, ChannelActivity>,
    bot_conversations: TtlCache<ChannelKey, BotConversationState>,
}

impl ActivityTracker {
    pub fn new(
        agent: AgentIdentity,
        activity: &ActivityConfig,
        bots: &BotInteractionConfig,
    ) -> Self {
        Self {
            agent,
            catchup_after: activity.catchup_after_messages,
            catchup_if_named_after: activity.catchup_if_mentioned_after_messages,
            allowed_threads: activity.allowed_threads.clone(),
            max_back_and_forth: bots.max_back_and_forth,
            cooldown: Duration::from_secs(bots.cooldown_secs),
            cooldown_reaction: bots.cooldown_reaction.clone(),
            counters: TtlCache::new(
                Duration::from_secs(activity.stale_counter_ttl_secs),
                activity.max_cached_channels,
            ),
            bot_conversations: TtlCache::new(
                Duration::from_secs(bots.stale_ttl_secs),
                activity.max_cached_channels,
            )
            .with_pin(BotConversationState::is_blocked_at),
        }
    }

    pub fn agent(&self) -> &AgentIdentity {
        &self.agent
    }

    /// Non-thread channels are always allowed; an empty allow-list allows
    /// every thread.
    pub fn is_thread_allowed(&self, location: &ChannelLocation) -> bool {
        !location.is_thread()
            || self.allowed_threads.is_empty()
            || self.allowed_threads.contains(&location.channel_id)
    }

    /// Count the message and decide whether it triggers a response.
    ///
    /// Any fired trigger resets the channel counter to zero.
    pub fn record_and_classify(&self, message: &ChatMessage) -> Classification {
        let channel_key = message.channel_key();
        let now = Instant::now();

        let trigger = self.counters.update(&channel_key, now, |slot| {
            let state = slot.get_or_insert(ChannelActivity {
                message_count: 0,
                last_updated: now,
            });
            state.message_count = state.message_count.saturating_add(1);
            state.last_updated = now;

            let trigger = self.classify(message, state.message_count);
            if trigger.fired() {
                state.message_count = 0;
            }
            trigger
        });

        debug!(channel = %channel_key, trigger = ?trigger, "Classified message");
        if trigger.fired() {
            info!(channel = %channel_key, trigger = ?trigger, "Trigger fired");
        }

        Classification {
            trigger,
            channel_key,
        }
    }

    fn classify(&self, message: &ChatMessage, count: u32) -> Trigger {
        if !self.agent.user_id.is_empty() {
            if message.mentions_user(&self.agent.user_id) {
                return Trigger::Mention;
            }
            if message.is_reply_to(&self.agent.user_id) {
                return Trigger::Reply;
            }
        }
        if count >= self.catchup_after
            || (count >= self.catchup_if_named_after && self.agent.is_named_in(&message.content))
        {
            return Trigger::Catchup;
        }
        Trigger::None
    }

    /// Decide whether a message from another bot should be ignored.
    ///
    /// Humans and the agent itself are never suppressed.
    pub fn should_suppress_bot_loop(&self, message: &ChatMessage) -> BotLoopVerdict {
        if !message.author.is_bot || self.agent.is_self(&message.author.id) {
            return BotLoopVerdict::allow();
        }

        let channel_key = message.channel_key();
        let bot_id = message.author.id.as_str();
        let now = Instant::now();

        self.bot_conversations.update(&channel_key, now, |slot| {
            let tracked = slot.as_ref().is_some_and(|s| s.tracked_bot_id == bot_id);
            if !tracked {
                debug!(channel = %channel_key, bot_id, "Tracking new bot conversation");
                *slot = Some(BotConversationState::new(bot_id, now));
                return BotLoopVerdict::allow();
            }
            let Some(state) = slot.as_mut() else {
                return BotLoopVerdict::allow();
            };
            state.last_updated = now;

            if let Some(until) = state.blocked_until {
                if now < until {
                    return BotLoopVerdict::suppress(None);
                }
                state.blocked_until = None;
                state.exchange_count = 0;
                state.cooldown_reaction_sent = false;
            }

            if state.last_direction == Direction::SelfSent {
                state.exchange_count += 1;
            }
            state.last_direction = Direction::Other;

            if state.exchange_count > self.max_back_and_forth {
                state.blocked_until = Some(now + self.cooldown);
                info!(
                    channel = %channel_key,
                    bot_id,
                    exchanges = state.exchange_count,
                    cooldown_secs = self.cooldown.as_secs(),
                    "Bot loop detected, cooling down"
                );
                let reaction = if state.cooldown_reaction_sent {
                    None
                } else {
                    state.cooldown_reaction_sent = true;
                    self.cooldown_reaction.clone()
                };
                return BotLoopVerdict::suppress(reaction);
            }

            BotLoopVerdict::allow()
        })
    }

    /// The agent posted in `channel_key`.
    ///
    /// Resets the catch-up counter and marks the agent as having spoken last
    /// in any tracked bot conversation. If that conversation was cooling
    /// down, the agent speaking ends the cooldown and starts counting afresh.
    pub fn on_bot_message_sent(&self, channel_key: &ChannelKey) {
        let now = Instant::now();

        self.counters.update(channel_key, now, |slot| {
            *slot = Some(ChannelActivity {
                message_count: 0,
                last_updated: now,
            });
        });

        self.bot_conversations.update(channel_key, now, |slot| {
            if let Some(state) = slot {
                state.last_direction = Direction::SelfSent;
                state.last_updated = now;
                if state.blocked_until.take().is_some() {
                    state.exchange_count = 0;
                    state.cooldown_reaction_sent = false;
                }
            }
        });
    }

    /// A human spoke: forget any bot conversation in the channel.
    pub fn clear_bot_conversation(&self, channel_key: &ChannelKey) {
        if self.bot_conversations.remove(channel_key).is_some() {
            debug!(channel = %channel_key, "Human message cleared bot conversation");
        }
    }

    pub fn catchup_count(&self, channel_key: &ChannelKey) -> u32 {
        self.counters
            .get(channel_key, Instant::now())
            .map_or(0, |s| s.message_count)
    }

    pub fn bot_conversation(&self, channel_key: &ChannelKey) -> Option<BotConversationState> {
        self.bot_conversations.get(channel_key, Instant::now())
    }

    /// Evict idle counters and bot conversations. Returns `(counters, bots)`.
    pub fn sweep(&self) -> (usize, usize) {
        let now = Instant::now();
        (self.counters.sweep(now), self.bot_conversations.sweep(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use banter_core::channel::{Author, ReplyRef};

    const AGENT: &str = "agent";

    fn tracker() -> ActivityTracker {
        tracker_with(BotInteractionConfig::default())
    }

    fn tracker_with(bots: BotInteractionConfig) -> ActivityTracker {
        let activity = ActivityConfig {
            catchup_after_messages: 5,
            catchup_if_mentioned_after_messages: 2,
            allowed_threads: vec!["t-ok".into()],
            ..Default::default()
        };
        ActivityTracker::new(
            AgentIdentity::new(AGENT, vec!["banter".into()]),
            &activity,
            &bots,
        )
    }

    fn from(author: &str, is_bot: bool, content: &str) -> ChatMessage {
        ChatMessage {
            id: "m".into(),
            author: Author {
                id: author.into(),
                name: author.into(),
                is_bot,
            },
            location: ChannelLocation::guild("g", "c"),
            content: content.into(),
            mentions: vec![],
            reply_to: None,
            timestamp: chrono::Utc::now(),
        }
    }

    fn human(content: &str) -> ChatMessage {
        from("alice", false, content)
    }

    fn key() -> ChannelKey {
        ChannelKey::new(Some("g"), "c")
    }

    #[tokio::test(start_paused = true)]
    async fn mention_fires_regardless_of_counter() {
        let tracker = tracker();
        let mut msg = human("hello");
        msg.mentions = vec![AGENT.into()];
        assert_eq!(tracker.record_and_classify(&msg).trigger, Trigger::Mention);
        assert_eq!(tracker.catchup_count(&key()), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reply_fires() {
        let tracker = tracker();
        let mut msg = human("thanks");
        msg.reply_to = Some(ReplyRef {
            message_id: "m0".into(),
            author_id: AGENT.into(),
        });
        assert_eq!(tracker.record_and_classify(&msg).trigger, Trigger::Reply);
    }

    #[tokio::test(start_paused = true)]
    async fn catchup_after_threshold_then_resets() {
        let tracker = tracker();
        for i in 1..5 {
            assert_eq!(tracker.record_and_classify(&human("chatter")).trigger, Trigger::None);
            assert_eq!(tracker.catchup_count(&key()), i);
        }
        assert_eq!(tracker.record_and_classify(&human("chatter")).trigger, Trigger::Catchup);
        assert_eq!(tracker.catchup_count(&key()), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn naming_the_agent_lowers_the_threshold() {
        let tracker = tracker();
        assert_eq!(tracker.record_and_classify(&human("banter?")).trigger, Trigger::None);
        assert_eq!(
            tracker.record_and_classify(&human("what does banter think")).trigger,
            Trigger::Catchup
        );
    }

    #[tokio::test(start_paused = true)]
    async fn own_message_resets_counter() {
        let tracker = tracker();
        tracker.record_and_classify(&human("a"));
        tracker.record_and_classify(&human("b"));
        tracker.on_bot_message_sent(&key());
        assert_eq!(tracker.catchup_count(&key()), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn channels_do_not_share_counters() {
        let tracker = tracker();
        tracker.record_and_classify(&human("a"));
        let mut elsewhere = human("b");
        elsewhere.location = ChannelLocation::dm("c");
        tracker.record_and_classify(&elsewhere);
        assert_eq!(tracker.catchup_count(&key()), 1);
        assert_eq!(tracker.catchup_count(&elsewhere.channel_key()), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_counter_is_evicted() {
        let tracker = tracker();
        tracker.record_and_classify(&human("a"));
        tokio::time::advance(Duration::from_secs(3601)).await;
        assert_eq!(tracker.sweep(), (1, 0));
        assert_eq!(tracker.catchup_count(&key()), 0);
    }

    #[test]
    fn thread_allow_list() {
        let tracker = tracker();
        let plain = ChannelLocation::guild("g", "c");
        let mut allowed = ChannelLocation::guild("g", "t-ok");
        allowed.thread_parent_id = Some("c".into());
        let mut denied = ChannelLocation::guild("g", "t-no");
        denied.thread_parent_id = Some("c".into());

        assert!(tracker.is_thread_allowed(&plain));
        assert!(tracker.is_thread_allowed(&allowed));
        assert!(!tracker.is_thread_allowed(&denied));
    }

    #[tokio::test(start_paused = true)]
    async fn humans_and_self_are_never_suppressed() {
        let tracker = tracker();
        assert!(!tracker.should_suppress_bot_loop(&human("hi")).suppressed);
        assert!(!tracker.should_suppress_bot_loop(&from(AGENT, true, "hi")).suppressed);
        assert!(tracker.bot_conversation(&key()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn first_bot_message_creates_state() {
        let tracker = tracker();
        let verdict = tracker.should_suppress_bot_loop(&from("B", true, "beep"));
        assert!(!verdict.suppressed);

        let state = tracker.bot_conversation(&key()).unwrap();
        assert_eq!(state.tracked_bot_id, "B");
        assert_eq!(state.exchange_count, 0);
        assert_eq!(state.last_direction, Direction::Other);
        assert!(state.blocked_until.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn exchange_counts_only_after_self() {
        let tracker = tracker();
        let bot = from("B", true, "beep");
        tracker.should_suppress_bot_loop(&bot);
        tracker.should_suppress_bot_loop(&bot);
        assert_eq!(tracker.bot_conversation(&key()).unwrap().exchange_count, 0);

        tracker.on_bot_message_sent(&key());
        tracker.should_suppress_bot_loop(&bot);
        assert_eq!(tracker.bot_conversation(&key()).unwrap().exchange_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn loop_is_blocked_after_max_round_trips() {
        let tracker = tracker_with(BotInteractionConfig {
            max_back_and_forth: 3,
            cooldown_secs: 600,
            cooldown_reaction: Some("🛑".into()),
            ..Default::default()
        });
        let bot = from("B", true, "beep");
        assert!(!tracker.should_suppress_bot_loop(&bot).suppressed);

        for _ in 0..3 {
            tracker.on_bot_message_sent(&key());
            assert!(!tracker.should_suppress_bot_loop(&bot).suppressed);
        }
        assert_eq!(tracker.bot_conversation(&key()).unwrap().exchange_count, 3);

        tracker.on_bot_message_sent(&key());
        let started = Instant::now();
        let verdict = tracker.should_suppress_bot_loop(&bot);
        assert!(verdict.suppressed);
        assert_eq!(verdict.reaction.as_deref(), Some("🛑"));
        let state = tracker.bot_conversation(&key()).unwrap();
        assert_eq!(state.blocked_until, Some(started + Duration::from_secs(600)));

        // Still blocked: no second reaction, count untouched.
        let again = tracker.should_suppress_bot_loop(&bot);
        assert!(again.suppressed);
        assert!(again.reaction.is_none());
        assert_eq!(tracker.bot_conversation(&key()).unwrap().exchange_count, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_expiry_resets_exchanges() {
        let tracker = tracker_with(BotInteractionConfig {
            max_back_and_forth: 0,
            cooldown_secs: 60,
            stale_ttl_secs: 3600,
            ..Default::default()
        });
        let bot = from("B", true, "beep");
        tracker.should_suppress_bot_loop(&bot);
        tracker.on_bot_message_sent(&key());
        assert!(tracker.should_suppress_bot_loop(&bot).suppressed);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(!tracker.should_suppress_bot_loop(&bot).suppressed);
        let state = tracker.bot_conversation(&key()).unwrap();
        assert_eq!(state.exchange_count, 0);
        assert!(state.blocked_until.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_outlasts_the_idle_ttl() {
        let tracker = tracker_with(BotInteractionConfig {
            max_back_and_forth: 0,
            cooldown_secs: 3600,
            stale_ttl_secs: 1800,
            ..Default::default()
        });
        let bot = from("B", true, "beep");
        tracker.should_suppress_bot_loop(&bot);
        tracker.on_bot_message_sent(&key());
        assert!(tracker.should_suppress_bot_loop(&bot).suppressed);

        tokio::time::advance(Duration::from_secs(2000)).await;
        assert_eq!(tracker.sweep().1, 0);
        assert!(tracker.should_suppress_bot_loop(&bot).suppressed);

        tokio::time::advance(Duration::from_secs(1601)).await;
        assert!(!tracker.should_suppress_bot_loop(&bot).suppressed);
    }

    #[tokio::test(start_paused = true)]
    async fn different_bot_replaces_state() {
        let tracker = tracker();
        tracker.should_suppress_bot_loop(&from("B", true, "beep"));
        tracker.on_bot_message_sent(&key());
        tracker.should_suppress_bot_loop(&from("B", true, "beep"));

        assert!(!tracker.should_suppress_bot_loop(&from("C", true, "boop")).suppressed);
        let state = tracker.bot_conversation(&key()).unwrap();
        assert_eq!(state.tracked_bot_id, "C");
        assert_eq!(state.exchange_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn human_clears_bot_conversation() {
        let tracker = tracker();
        tracker.should_suppress_bot_loop(&from("B", true, "beep"));
        tracker.clear_bot_conversation(&key());
        assert!(tracker.bot_conversation(&key()).is_none());
    }
}
