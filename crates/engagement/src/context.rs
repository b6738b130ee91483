//! Read-only inputs shared by the scorer and the planner.

use banter_config::AgentConfig;
use banter_core::channel::{ChannelKey, ChatMessage};
use banter_core::metrics::{ChannelMetrics, CostTotals, MetricsProvider};
use regex_lite::Regex;

/// Who the agent is on the chat platform.
#[derive(Debug, Clone, Default)]
pub struct AgentIdentity {
    /// Platform user ID; empty disables @mention and reply detection
    pub user_id: String,
    names: Vec<String>,
    /// Whole-word matcher over `names`; `None` when there are no names
    name_pattern: Option<Regex>,
}

impl PartialEq for AgentIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.user_id == other.user_id && self.names == other.names
    }
}

impl AgentIdentity {
    pub fn new(user_id: impl Into<String>, names: Vec<String>) -> Self {
        let name_pattern = word_pattern(names.iter().map(String::as_str));
        Self {
            user_id: user_id.into(),
            names,
            name_pattern,
        }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(config.user_id.clone(), config.all_names())
    }

    pub fn is_self(&self, author_id: &str) -> bool {
        !self.user_id.is_empty() && self.user_id == author_id
    }

    /// @mention or reply to one of the agent's messages.
    pub fn is_directly_addressed(&self, message: &ChatMessage) -> bool {
        !self.user_id.is_empty()
            && (message.mentions_user(&self.user_id) || message.is_reply_to(&self.user_id))
    }

    /// Whether `text` contains any of the agent's names as a whole word.
    pub fn is_named_in(&self, text: &str) -> bool {
        self.name_pattern
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(text))
    }

    /// Plaintext name and nicknames.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn display_name(&self) -> &str {
        self.names.first().map(String::as_str).unwrap_or("banter")
    }
}

/// Everything the scorer and planner know about one message.
#[derive(Debug, Clone)]
pub struct EngagementContext {
    pub message: ChatMessage,
    pub channel_key: ChannelKey,
    /// Recent messages before `message`, oldest first
    pub recent: Vec<ChatMessage>,
    pub metrics: Option<ChannelMetrics>,
    pub costs: Option<CostTotals>,
    pub is_dm: bool,
    pub agent: AgentIdentity,
}

impl EngagementContext {
    pub fn new(
        message: &ChatMessage,
        recent: &[ChatMessage],
        metrics: &dyn MetricsProvider,
        agent: &AgentIdentity,
    ) -> Self {
        let channel_key = message.channel_key();
        Self {
            metrics: metrics.channel_metrics(&channel_key),
            costs: metrics.cost_totals(&channel_key),
            is_dm: message.location.is_dm(),
            message: message.clone(),
            recent: recent.to_vec(),
            channel_key,
            agent: agent.clone(),
        }
    }
}

/// Case-insensitive whole-word matcher for any of `words`.
///
/// Words may contain spaces, which match any run of whitespace. Returns
/// `None` when every word is blank.
pub(crate) fn word_pattern<'a>(words: impl IntoIterator<Item = &'a str>) -> Option<Regex> {
    let alternatives: Vec<String> = words
        .into_iter()
        .map(str::trim)
        .filter(|w| !w.is_empty())
        .map(|w| {
            w.split_whitespace()
                .map(regex_lite::escape)
                .collect::<Vec<_>>()
                .join(r"\s+")
        })
        .collect();
    if alternatives.is_empty() {
        return None;
    }
    Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives.join("|"))).ok()
}
