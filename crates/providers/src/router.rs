//! Provider construction from configuration.

use std::sync::Arc;
use std::time::Duration;

use banter_core::provider::Provider;

use crate::openai_compat::OpenAiCompatProvider;
use crate::retry::RetryProvider;

/// Build the model client described by `config`.
///
/// Every backend speaks the OpenAI-compatible protocol; `api_url` overrides
/// the well-known base URL. The result is wrapped in a [`RetryProvider`]
/// bounded by `planner.timeout_secs`.
pub fn build_from_config(config: &banter_config::AppConfig) -> Arc<dyn Provider> {
    let api_key = config.api_key.clone().unwrap_or_default();
    let base_url = config
        .api_url
        .clone()
        .unwrap_or_else(|| default_base_url(&config.provider));

    let backend: Arc<dyn Provider> = Arc::new(OpenAiCompatProvider::new(
        &config.provider,
        &base_url,
        &api_key,
    ));

    Arc::new(RetryProvider::new(
        backend,
        Duration::from_secs(config.planner.timeout_secs),
    ))
}

/// Get the default base URL for well-known providers.
pub fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "fireworks" => "https://api.fireworks.ai/inference/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1".into(),
        _ => "https://openrouter.ai/api/v1".into(),
    }
}
