//! # Banter Core
//!
//! Domain types, collaborator traits, and error definitions for the Banter
//! engagement core. It has no async runtime dependency; it defines the model every
//! other crate implements against.
//!
//! ## Collaborators
//!
//! The engagement core never talks to a chat platform or an LLM directly.
//! Each collaborator is a trait here:
//! - [`Provider`]: the model client (forced function calling)
//! - [`ChatTransport`]: send/react primitives of the chat platform
//! - [`MetricsProvider`]: read-only per-channel activity and spend
//! - [`UsageRecorder`]: write side for model-call accounting

pub mod error;
pub mod message;
pub mod provider;
pub mod channel;
pub mod metrics;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use message::{Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolChoice, ToolDefinition, Usage};
pub use channel::{Author, ChannelKey, ChannelLocation, ChatMessage, ChatTransport, ReplyRef};
pub use metrics::{ChannelMetrics, CostTotals, MetricsProvider, NoMetrics, UsageRecorder};
