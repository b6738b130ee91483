//! Model client implementations for Banter.
//!
//! All providers implement the `banter_core::Provider` trait.
//! [`build_from_config`] assembles the client the planner talks to: an
//! OpenAI-compatible backend wrapped in a timeout-and-retry layer.

pub mod openai_compat;
pub mod retry;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use retry::RetryProvider;
pub use router::{build_from_config, default_base_url};
