//! Chat-side domain types and the transport trait.
//!
//! A [`ChatMessage`] is what the chat platform hands us; a [`ChannelKey`] is
//! the identifier every piece of per-channel state is scoped by.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TransportError;

/// Prefix used for direct-message channel keys.
pub const DM_SENTINEL: &str = "@dm";

/// Composite key scoping all per-channel state.
///
/// Guild channels are keyed `guild:channel`; direct messages are keyed
/// `@dm:channel`, so a DM can never collide with a guild channel that
/// happens to share an ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelKey(String);

impl ChannelKey {
    pub fn new(guild_id: Option<&str>, channel_id: &str) -> Self {
        match guild_id {
            Some(guild) => Self(format!("{guild}:{channel_id}")),
            None => Self(format!("{DM_SENTINEL}:{channel_id}")),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a message was posted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelLocation {
    /// Guild (server) ID; `None` for direct messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,

    /// Channel ID (the thread ID when posted inside a thread)
    pub channel_id: String,

    /// Parent channel when `channel_id` is a thread
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_parent_id: Option<String>,
}

impl ChannelLocation {
    pub fn guild(guild_id: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            guild_id: Some(guild_id.into()),
            channel_id: channel_id.into(),
            thread_parent_id: None,
        }
    }

    pub fn dm(channel_id: impl Into<String>) -> Self {
        Self {
            guild_id: None,
            channel_id: channel_id.into(),
            thread_parent_id: None,
        }
    }

    pub fn key(&self) -> ChannelKey {
        ChannelKey::new(self.guild_id.as_deref(), &self.channel_id)
    }

    pub fn is_dm(&self) -> bool {
        self.guild_id.is_none()
    }

    pub fn is_thread(&self) -> bool {
        self.thread_parent_id.is_some()
    }
}

/// Who wrote a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    /// Platform user ID
    pub id: String,

    /// Display name
    pub name: String,

    /// Whether the platform flags this account as automated
    #[serde(default)]
    pub is_bot: bool,
}

/// The message a reply points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRef {
    pub message_id: String,
    pub author_id: String,
}

/// A message received from the chat platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Platform message ID
    pub id: String,

    pub author: Author,

    pub location: ChannelLocation,

    /// The text content
    #[serde(default)]
    pub content: String,

    /// User IDs explicitly @mentioned
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mentions: Vec<String>,

    /// Reply reference, when this message answers another one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<ReplyRef>,

    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn channel_key(&self) -> ChannelKey {
        self.location.key()
    }

    pub fn mentions_user(&self, user_id: &str) -> bool {
        self.mentions.iter().any(|m| m == user_id)
    }

    pub fn is_reply_to(&self, user_id: &str) -> bool {
        self.reply_to
            .as_ref()
            .is_some_and(|r| r.author_id == user_id)
    }
}

/// Send/react primitives exposed by the chat platform.
///
/// Connection lifecycle, reconnection and delivery retries live behind this
/// trait; the engagement core only issues fire-and-report calls.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Post a text message, optionally as a reply.
    async fn send_message(
        &self,
        location: &ChannelLocation,
        content: &str,
        reply_to: Option<&str>,
    ) -> std::result::Result<(), TransportError>;

    /// Add an emoji reaction to a message.
    async fn react(
        &self,
        location: &ChannelLocation,
        message_id: &str,
        emoji: &str,
    ) -> std::result::Result<(), TransportError>;
}
