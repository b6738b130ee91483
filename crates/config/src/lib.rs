//! Configuration loading, validation, and management for Banter.
//!
//! Loads configuration from `~/.banter/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.banter/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the model provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model provider name ("openrouter", "openai", "ollama", ...)
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Override the provider's base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Model used for plan generation
    #[serde(default = "default_model")]
    pub model: String,

    /// Who the agent is on the chat platform
    #[serde(default)]
    pub agent: AgentConfig,

    /// Catch-up counters and thread allow-list
    #[serde(default)]
    pub activity: ActivityConfig,

    /// Bot-loop suppression
    #[serde(default)]
    pub bot_interaction: BotInteractionConfig,

    /// Engagement scorer weights and preferences
    #[serde(default)]
    pub engagement: EngagementConfig,

    /// Per-scope sliding-window rate limits
    #[serde(default)]
    pub rate_limits: RateLimitConfig,

    /// Plan generation
    #[serde(default)]
    pub planner: PlannerConfig,

    /// Background sweeps
    #[serde(default)]
    pub maintenance: MaintenanceConfig,

    /// Cost tracking
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

fn default_provider() -> String {
    "openrouter".into()
}
fn default_model() -> String {
    "openai/gpt-4o-mini".into()
}
fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("provider", &self.provider)
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("agent", &self.agent)
            .field("activity", &self.activity)
            .field("bot_interaction", &self.bot_interaction)
            .field("engagement", &self.engagement)
            .field("rate_limits", &self.rate_limits)
            .field("planner", &self.planner)
            .field("maintenance", &self.maintenance)
            .field("telemetry", &self.telemetry)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// The agent's platform user ID (used for @mention / reply detection)
    #[serde(default)]
    pub user_id: String,

    /// Plaintext name people use to address the agent
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Additional plaintext nicknames
    #[serde(default)]
    pub nicknames: Vec<String>,
}

fn default_agent_name() -> String {
    "banter".into()
}

impl AgentConfig {
    /// Name plus nicknames, empty entries removed.
    pub fn all_names(&self) -> Vec<String> {
        std::iter::once(&self.name)
            .chain(self.nicknames.iter())
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect()
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            user_id: String::new(),
            name: default_agent_name(),
            nicknames: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityConfig {
    /// Messages since the agent last spoke before a catch-up fires
    #[serde(default = "default_catchup_after")]
    pub catchup_after_messages: u32,

    /// Lower threshold used when the text names the agent
    #[serde(default = "default_catchup_if_mentioned")]
    pub catchup_if_mentioned_after_messages: u32,

    /// Idle time after which a channel counter is evicted
    #[serde(default = "default_stale_counter_ttl")]
    pub stale_counter_ttl_secs: u64,

    /// Thread IDs the agent may act in. Empty = all threads allowed.
    #[serde(default)]
    pub allowed_threads: Vec<String>,

    /// Upper bound on tracked channels per cache
    #[serde(default = "default_max_cached_channels")]
    pub max_cached_channels: usize,
}

fn default_catchup_after() -> u32 {
    12
}
fn default_catchup_if_mentioned() -> u32 {
    4
}
fn default_stale_counter_ttl() -> u64 {
    3600
}
fn default_max_cached_channels() -> usize {
    10_000
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            catchup_after_messages: default_catchup_after(),
            catchup_if_mentioned_after_messages: default_catchup_if_mentioned(),
            stale_counter_ttl_secs: default_stale_counter_ttl(),
            allowed_threads: vec![],
            max_cached_channels: default_max_cached_channels(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotInteractionConfig {
    /// Completed round trips allowed with another bot before cooling down
    #[serde(default = "default_max_back_and_forth")]
    pub max_back_and_forth: u32,

    /// How long the agent ignores a looping bot
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// Idle time after which bot-conversation state is evicted
    #[serde(default = "default_bot_stale_ttl")]
    pub stale_ttl_secs: u64,

    /// Emoji posted once when a cooldown starts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown_reaction: Option<String>,
}

fn default_max_back_and_forth() -> u32 {
    3
}
fn default_cooldown_secs() -> u64 {
    600
}
fn default_bot_stale_ttl() -> u64 {
    1800
}

impl Default for BotInteractionConfig {
    fn default() -> Self {
        Self {
            max_back_and_forth: default_max_back_and_forth(),
            cooldown_secs: default_cooldown_secs(),
            stale_ttl_secs: default_bot_stale_ttl(),
            cooldown_reaction: None,
        }
    }
}

/// Per-signal weights of the engagement scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementWeights {
    #[serde(default = "default_mention_weight")]
    pub mention: f64,
    #[serde(default = "default_question_weight")]
    pub question: f64,
    #[serde(default = "default_technical_weight")]
    pub technical: f64,
    #[serde(default = "default_human_activity_weight")]
    pub human_activity: f64,
    #[serde(default = "default_cost_saturation_weight")]
    pub cost_saturation: f64,
    #[serde(default = "default_bot_noise_weight")]
    pub bot_noise: f64,
}

fn default_mention_weight() -> f64 {
    0.3
}
fn default_question_weight() -> f64 {
    0.2
}
fn default_technical_weight() -> f64 {
    0.15
}
fn default_human_activity_weight() -> f64 {
    0.15
}
fn default_cost_saturation_weight() -> f64 {
    0.1
}
fn default_bot_noise_weight() -> f64 {
    0.1
}

impl EngagementWeights {
    /// `(name, weight)` pairs in scoring order.
    pub fn entries(&self) -> [(&'static str, f64); 6] {
        [
            ("mention", self.mention),
            ("question", self.question),
            ("technical", self.technical),
            ("human_activity", self.human_activity),
            ("cost_saturation", self.cost_saturation),
            ("bot_noise", self.bot_noise),
        ]
    }

    /// Apply a partial override on top of these weights.
    pub fn overridden(&self, o: &WeightOverrides) -> Self {
        Self {
            mention: o.mention.unwrap_or(self.mention),
            question: o.question.unwrap_or(self.question),
            technical: o.technical.unwrap_or(self.technical),
            human_activity: o.human_activity.unwrap_or(self.human_activity),
            cost_saturation: o.cost_saturation.unwrap_or(self.cost_saturation),
            bot_noise: o.bot_noise.unwrap_or(self.bot_noise),
        }
    }
}

impl Default for EngagementWeights {
    fn default() -> Self {
        Self {
            mention: default_mention_weight(),
            question: default_question_weight(),
            technical: default_technical_weight(),
            human_activity: default_human_activity_weight(),
            cost_saturation: default_cost_saturation_weight(),
            bot_noise: default_bot_noise_weight(),
        }
    }
}

/// Partial weights, used for per-channel overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mention: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technical: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub human_activity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_saturation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_noise: Option<f64>,
}

/// Score range in which the optional refinement step runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbabilisticBand {
    pub low: f64,
    pub high: f64,
}

impl ProbabilisticBand {
    pub fn contains(&self, score: f64) -> bool {
        score >= self.low && score <= self.high
    }
}

impl Default for ProbabilisticBand {
    fn default() -> Self {
        Self {
            low: 0.4,
            high: 0.6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementPreferences {
    /// Minimum score for a catch-up response
    #[serde(default = "default_min_engage_threshold")]
    pub min_engage_threshold: f64,

    /// Multiplier applied to the score in direct messages
    #[serde(default = "default_dm_boost")]
    pub dm_boost: f64,

    /// Run the refinement step for scores inside `probabilistic_band`
    #[serde(default)]
    pub enable_refinement: bool,

    #[serde(default)]
    pub probabilistic_band: ProbabilisticBand,
}

fn default_min_engage_threshold() -> f64 {
    0.5
}
fn default_dm_boost() -> f64 {
    1.5
}

impl Default for EngagementPreferences {
    fn default() -> Self {
        Self {
            min_engage_threshold: default_min_engage_threshold(),
            dm_boost: default_dm_boost(),
            enable_refinement: false,
            probabilistic_band: ProbabilisticBand::default(),
        }
    }
}

/// Per-channel tuning of the scorer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_engage_threshold: Option<f64>,

    #[serde(default)]
    pub weights: WeightOverrides,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngagementConfig {
    #[serde(default)]
    pub weights: EngagementWeights,

    #[serde(default)]
    pub preferences: EngagementPreferences,

    /// Keyed by channel key (`guild:channel` or `@dm:channel`)
    #[serde(default)]
    pub channel_overrides: HashMap<String, ChannelOverride>,
}

impl EngagementConfig {
    /// Weights and preferences in effect for one channel.
    pub fn effective_for(&self, channel_key: &str) -> (EngagementWeights, EngagementPreferences) {
        match self.channel_overrides.get(channel_key) {
            Some(o) => {
                let mut prefs = self.preferences.clone();
                if let Some(threshold) = o.min_engage_threshold {
                    prefs.min_engage_threshold = threshold;
                }
                (self.weights.overridden(&o.weights), prefs)
            }
            None => (self.weights.clone(), self.preferences.clone()),
        }
    }
}

/// Limit for one rate-limit scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeLimit {
    pub limit: usize,
    pub window_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_user_limit")]
    pub user: ScopeLimit,
    #[serde(default = "default_channel_limit")]
    pub channel: ScopeLimit,
    #[serde(default = "default_guild_limit")]
    pub guild: ScopeLimit,
}

fn default_user_limit() -> ScopeLimit {
    ScopeLimit {
        limit: 5,
        window_secs: 60,
    }
}
fn default_channel_limit() -> ScopeLimit {
    ScopeLimit {
        limit: 20,
        window_secs: 60,
    }
}
fn default_guild_limit() -> ScopeLimit {
    ScopeLimit {
        limit: 60,
        window_secs: 60,
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            user: default_user_limit(),
            channel: default_channel_limit(),
            guild: default_guild_limit(),
        }
    }
}

/// What the planner answers with when the model fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackAction {
    #[default]
    Ignore,
    React,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    #[serde(default = "default_planner_temperature")]
    pub temperature: f32,

    #[serde(default = "default_planner_max_tokens")]
    pub max_tokens: u32,

    /// Per-attempt timeout at the model-client boundary
    #[serde(default = "default_planner_timeout")]
    pub timeout_secs: u64,

    /// Recent messages included in the planning prompt
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    #[serde(default)]
    pub fallback_action: FallbackAction,

    #[serde(default = "default_fallback_reaction")]
    pub fallback_reaction: String,

    /// Sent when executing a plan fails
    #[serde(default = "default_apology")]
    pub apology: String,

    /// Record model usage into the telemetry ledger
    #[serde(default = "default_true")]
    pub record_usage: bool,
}

fn default_planner_temperature() -> f32 {
    0.4
}
fn default_planner_max_tokens() -> u32 {
    800
}
fn default_planner_timeout() -> u64 {
    30
}
fn default_history_window() -> usize {
    20
}
fn default_fallback_reaction() -> String {
    "👀".into()
}
fn default_apology() -> String {
    "Sorry, something went wrong on my end.".into()
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            temperature: default_planner_temperature(),
            max_tokens: default_planner_max_tokens(),
            timeout_secs: default_planner_timeout(),
            history_window: default_history_window(),
            fallback_action: FallbackAction::default(),
            fallback_reaction: default_fallback_reaction(),
            apology: default_apology(),
            record_usage: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceConfig {
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_sweep_interval() -> u64 {
    60
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

/// Cost tracking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Custom model pricing overrides (model name → pricing)
    #[serde(default)]
    pub custom_pricing: HashMap<String, PricingOverrideConfig>,

    /// Quiet time after which a channel's ledger entry is dropped
    #[serde(default = "default_channel_ttl")]
    pub channel_ttl_secs: u64,
}

fn default_channel_ttl() -> u64 {
    86_400
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            custom_pricing: HashMap::new(),
            channel_ttl_secs: default_channel_ttl(),
        }
    }
}

/// Custom per-million-token pricing for a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingOverrideConfig {
    /// Price per 1M input tokens in USD
    pub input_per_m: f64,
    /// Price per 1M output tokens in USD
    pub output_per_m: f64,
}

impl AppConfig {
    /// Load configuration from the default path (~/.banter/config.toml).
    ///
    /// Also checks environment variables for API keys:
    /// - `BANTER_API_KEY` (highest priority)
    /// - `OPENROUTER_API_KEY`
    /// - `OPENAI_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();
        let mut config = Self::load_from(&config_path)?;

        // Environment variable overrides (highest priority)
        if config.api_key.is_none() {
            config.api_key = std::env::var("BANTER_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(provider) = std::env::var("BANTER_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("BANTER_MODEL") {
            config.model = model;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".banter")
    }

    /// Get the default configuration file path.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, weight) in self.engagement.weights.entries() {
            check_weight(name, weight)?;
        }
        if self.engagement.weights.entries().iter().map(|(_, w)| w).sum::<f64>() <= 0.0 {
            return Err(ConfigError::ValidationError(
                "engagement weights must sum to > 0".into(),
            ));
        }
        check_unit("min_engage_threshold", self.engagement.preferences.min_engage_threshold)?;

        let band = &self.engagement.preferences.probabilistic_band;
        check_unit("probabilistic_band.low", band.low)?;
        check_unit("probabilistic_band.high", band.high)?;
        if band.low > band.high {
            return Err(ConfigError::ValidationError(
                "probabilistic_band.low must not exceed probabilistic_band.high".into(),
            ));
        }

        let dm_boost = self.engagement.preferences.dm_boost;
        if !dm_boost.is_finite() || dm_boost < 0.0 {
            return Err(ConfigError::ValidationError(
                "dm_boost must be a non-negative number".into(),
            ));
        }

        for (channel, o) in &self.engagement.channel_overrides {
            if let Some(threshold) = o.min_engage_threshold {
                check_unit(&format!("channel_overrides.{channel}.min_engage_threshold"), threshold)?;
            }
            let merged = self.engagement.weights.overridden(&o.weights);
            for (name, weight) in merged.entries() {
                check_weight(name, weight)?;
            }
        }

        if self.activity.catchup_after_messages == 0
            || self.activity.catchup_if_mentioned_after_messages == 0
        {
            return Err(ConfigError::ValidationError(
                "catch-up thresholds must be at least 1".into(),
            ));
        }

        if self.bot_interaction.cooldown_secs > self.bot_interaction.stale_ttl_secs {
            return Err(ConfigError::ValidationError(
                "bot_interaction.cooldown_secs must not exceed bot_interaction.stale_ttl_secs".into(),
            ));
        }

        for (scope, limit) in [
            ("user", &self.rate_limits.user),
            ("channel", &self.rate_limits.channel),
            ("guild", &self.rate_limits.guild),
        ] {
            if limit.limit == 0 || limit.window_secs == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "rate_limits.{scope} needs limit > 0 and window_secs > 0"
                )));
            }
        }

        if self.planner.temperature < 0.0 || self.planner.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "planner.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.planner.timeout_secs == 0 || self.maintenance.sweep_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "planner.timeout_secs and maintenance.sweep_interval_secs must be > 0".into(),
            ));
        }

        if self.telemetry.channel_ttl_secs == 0 {
            return Err(ConfigError::ValidationError(
                "telemetry.channel_ttl_secs must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for `config init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

fn check_weight(name: &str, weight: f64) -> Result<(), ConfigError> {
    if !weight.is_finite() || weight < 0.0 {
        return Err(ConfigError::ValidationError(format!(
            "weight '{name}' must be a non-negative number (got {weight})"
        )));
    }
    Ok(())
}

fn check_unit(name: &str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::ValidationError(format!(
            "{name} must be between 0.0 and 1.0 (got {value})"
        )));
    }
    Ok(())
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: default_provider(),
            api_url: None,
            model: default_model(),
            agent: AgentConfig::default(),
            activity: ActivityConfig::default(),
            bot_interaction: BotInteractionConfig::default(),
            engagement: EngagementConfig::default(),
            rate_limits: RateLimitConfig::default(),
            planner: PlannerConfig::default(),
            maintenance: MaintenanceConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
