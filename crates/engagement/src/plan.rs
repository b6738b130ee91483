//! The Plan: a fully populated, schema-constrained action directive.
//!
//! Model output arrives as loosely shaped JSON. [`validate`] deep-merges it
//! onto the canonical default and normalizes every field into its domain, so
//! a [`Plan`] is always complete and never contradicts itself: a reaction
//! plan always carries an emoji, an image plan always carries a prompt.
//! Invalid input degrades to safe defaults; validation never fails.

use banter_config::FallbackAction;
use banter_core::provider::ToolDefinition;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::warn;

/// Name of the function the model is forced to call.
pub const PLAN_FUNCTION: &str = "plan_response";

/// Emoji used when a reaction plan arrives without one.
pub const DEFAULT_REACTION: &str = "👀";

const MIN_TTS_SPEED: f64 = 0.25;
const MAX_TTS_SPEED: f64 = 4.0;

#[derive(Debug, Clone, Default, PartialEq)]
pub enum PlanAction {
    Message,
    React { reaction: String },
    #[default]
    Ignore,
    Image { request: ImageRequest },
}

impl PlanAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::React { .. } => "react",
            Self::Ignore => "ignore",
            Self::Image { .. } => "image",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    #[default]
    Text,
    Tts,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskTier {
    #[default]
    Low,
    Medium,
    High,
}

impl RiskTier {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Minimal,
    #[default]
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    #[default]
    Low,
    Medium,
    High,
}

/// Whether the reply generator may call tools.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoiceMode {
    #[default]
    None,
    Auto,
    Required,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchContextSize {
    #[default]
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebSearch {
    /// Empty means no search
    pub query: String,
    pub allowed_domains: Vec<String>,
    pub search_context_size: SearchContextSize,
}

impl WebSearch {
    pub fn is_requested(&self) -> bool {
        !self.query.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TtsOptions {
    pub voice: String,
    pub speed: f64,
}

impl Default for TtsOptions {
    fn default() -> Self {
        Self {
            voice: "alloy".into(),
            speed: 1.0,
        }
    }
}

/// Options forwarded to the reply generator.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelOptions {
    pub reasoning_effort: ReasoningEffort,
    pub verbosity: Verbosity,
    #[serde(rename = "tool_choice")]
    pub tool_choice: ToolChoiceMode,
    pub web_search: WebSearch,
    pub tts_options: TtsOptions,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    #[default]
    Online,
    Idle,
    Dnd,
    Invisible,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Presence {
    pub status: PresenceStatus,
    /// Activity text; empty leaves it unchanged
    pub activity: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AspectRatio {
    Square,
    Portrait,
    Landscape,
    #[default]
    Auto,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageQuality {
    Low,
    Medium,
    High,
    #[default]
    Auto,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Jpeg,
    Webp,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Background {
    #[default]
    Auto,
    Transparent,
    Opaque,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRequest {
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
    pub quality: ImageQuality,
    pub output_format: OutputFormat,
    /// 1–100
    pub output_compression: u8,
    pub background: Background,
    pub allow_prompt_adjustment: bool,
}

impl Default for ImageRequest {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            aspect_ratio: AspectRatio::default(),
            quality: ImageQuality::default(),
            output_format: OutputFormat::default(),
            output_compression: 100,
            background: Background::default(),
            allow_prompt_adjustment: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    pub action: PlanAction,
    pub modality: Modality,
    pub options: ModelOptions,
    pub presence: Presence,
    pub risk_tier: RiskTier,
}

impl Plan {
    /// The canonical default: do nothing.
    pub fn ignore() -> Self {
        Self::default()
    }

    pub fn react(reaction: impl Into<String>) -> Self {
        Self {
            action: PlanAction::React {
                reaction: reaction.into(),
            },
            ..Self::default()
        }
    }

    /// Plan used when the model cannot be consulted.
    pub fn fallback(action: FallbackAction, reaction: &str) -> Self {
        match action {
            FallbackAction::Ignore => Self::ignore(),
            FallbackAction::React if reaction.trim().is_empty() => Self::react(DEFAULT_REACTION),
            FallbackAction::React => Self::react(reaction.trim()),
        }
    }

    /// Whether executing this plan does anything.
    pub fn is_actionable(&self) -> bool {
        self.action != PlanAction::Ignore
    }

    /// Render back to the wire shape accepted by [`validate`].
    pub fn to_value(&self) -> Value {
        let reaction = match &self.action {
            PlanAction::React { reaction } => reaction.clone(),
            _ => String::new(),
        };
        let image = match &self.action {
            PlanAction::Image { request } => request.clone(),
            _ => ImageRequest::default(),
        };
        json!({
            "action": self.action.name(),
            "modality": self.modality,
            "reaction": reaction,
            "openaiOptions": self.options,
            "presence": self.presence,
            "imageRequest": image,
            "riskTier": self.risk_tier,
        })
    }
}

impl Serialize for Plan {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// Validate raw model output, using [`DEFAULT_REACTION`] for bare reactions.
pub fn validate(raw: &Value) -> Plan {
    validate_with(raw, DEFAULT_REACTION)
}

/// Validate raw model output into a complete [`Plan`].
pub fn validate_with(raw: &Value, fallback_reaction: &str) -> Plan {
    if !raw.is_object() {
        warn!(kind = json_kind(raw), "Plan payload is not an object, using default");
    }

    let mut merged = Plan::ignore().to_value();
    deep_merge(&mut merged, raw);
    let empty = Map::new();
    let root = merged.as_object().unwrap_or(&empty);

    let mut options = parse_options(object_field(root, "openaiOptions"));
    let presence = parse_presence(object_field(root, "presence"));
    let mut modality: Modality = parse_enum(root.get("modality")).unwrap_or_default();

    let risk_tier = match root.get("riskTier").and_then(Value::as_str).and_then(RiskTier::parse) {
        Some(tier) => tier,
        None => {
            warn!(raw = ?root.get("riskTier"), "Invalid riskTier, defaulting to Low");
            RiskTier::Low
        }
    };

    let action_name = root
        .get("action")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_ascii_lowercase());

    let action = match action_name.as_deref() {
        Some("message") => PlanAction::Message,
        Some("ignore") => PlanAction::Ignore,
        Some("react") => {
            let reaction = string_field(root, "reaction");
            let reaction = if !reaction.is_empty() {
                reaction
            } else if !fallback_reaction.trim().is_empty() {
                fallback_reaction.trim().to_string()
            } else {
                DEFAULT_REACTION.to_string()
            };
            PlanAction::React { reaction }
        }
        Some("image") => {
            let request = parse_image(object_field(root, "imageRequest"));
            if request.prompt.is_empty() {
                warn!("Image plan without a prompt, degrading to message");
                PlanAction::Message
            } else {
                PlanAction::Image { request }
            }
        }
        other => {
            warn!(action = ?other, "Unknown plan action, ignoring");
            PlanAction::Ignore
        }
    };

    match &action {
        PlanAction::Image { .. } => {
            modality = Modality::Text;
            options.tool_choice = ToolChoiceMode::None;
            options.web_search = WebSearch::default();
            options.tts_options = TtsOptions::default();
        }
        PlanAction::React { .. } | PlanAction::Ignore => modality = Modality::Text,
        PlanAction::Message => {}
    }

    Plan {
        action,
        modality,
        options,
        presence,
        risk_tier,
    }
}

/// Merge `patch` into `base`, recursing into objects; nulls are skipped.
fn deep_merge(base: &mut Value, patch: &Value) {
    let (Value::Object(base), Value::Object(patch)) = (base, patch) else {
        return;
    };
    for (key, value) in patch {
        if value.is_null() {
            continue;
        }
        if value.is_object() && base.get(key).is_some_and(Value::is_object) {
            if let Some(existing) = base.get_mut(key) {
                deep_merge(existing, value);
            }
        } else {
            base.insert(key.clone(), value.clone());
        }
    }
}

fn object_field<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Map<String, Value>> {
    obj.get(key).and_then(Value::as_object)
}

fn string_field(obj: &Map<String, Value>, key: &str) -> String {
    obj.get(key)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

/// Parse a lowercase enum from a string value, case-insensitively.
fn parse_enum<T: DeserializeOwned>(value: Option<&Value>) -> Option<T> {
    let s = value?.as_str()?.trim().to_ascii_lowercase();
    serde_json::from_value(Value::String(s)).ok()
}

fn parse_options(obj: Option<&Map<String, Value>>) -> ModelOptions {
    let Some(obj) = obj else {
        return ModelOptions::default();
    };
    ModelOptions {
        reasoning_effort: parse_enum(obj.get("reasoningEffort")).unwrap_or_default(),
        verbosity: parse_enum(obj.get("verbosity")).unwrap_or_default(),
        tool_choice: parse_enum(obj.get("tool_choice")).unwrap_or_default(),
        web_search: parse_web_search(object_field(obj, "webSearch")),
        tts_options: parse_tts(object_field(obj, "ttsOptions")),
    }
}

fn parse_web_search(obj: Option<&Map<String, Value>>) -> WebSearch {
    let Some(obj) = obj else {
        return WebSearch::default();
    };
    let allowed_domains = obj
        .get("allowedDomains")
        .and_then(Value::as_array)
        .map(|domains| {
            domains
                .iter()
                .filter_map(Value::as_str)
                .map(|d| d.trim().to_ascii_lowercase())
                .filter(|d| !d.is_empty())
                .collect()
        })
        .unwrap_or_default();
    WebSearch {
        query: string_field(obj, "query"),
        allowed_domains,
        search_context_size: parse_enum(obj.get("searchContextSize")).unwrap_or_default(),
    }
}

fn parse_tts(obj: Option<&Map<String, Value>>) -> TtsOptions {
    let defaults = TtsOptions::default();
    let Some(obj) = obj else {
        return defaults;
    };
    let voice = string_field(obj, "voice");
    let speed = obj
        .get("speed")
        .and_then(Value::as_f64)
        .filter(|s| s.is_finite())
        .map_or(defaults.speed, |s| s.clamp(MIN_TTS_SPEED, MAX_TTS_SPEED));
    TtsOptions {
        voice: if voice.is_empty() { defaults.voice } else { voice },
        speed,
    }
}

fn parse_presence(obj: Option<&Map<String, Value>>) -> Presence {
    let Some(obj) = obj else {
        return Presence::default();
    };
    Presence {
        status: parse_enum(obj.get("status")).unwrap_or_default(),
        activity: string_field(obj, "activity"),
    }
}

fn parse_image(obj: Option<&Map<String, Value>>) -> ImageRequest {
    let Some(obj) = obj else {
        return ImageRequest::default();
    };
    let output_compression = obj
        .get("outputCompression")
        .and_then(Value::as_f64)
        .filter(|c| c.is_finite())
        .map_or(100, |c| c.round().clamp(1.0, 100.0) as u8);
    ImageRequest {
        prompt: string_field(obj, "prompt"),
        aspect_ratio: parse_enum(obj.get("aspectRatio")).unwrap_or_default(),
        quality: parse_enum(obj.get("quality")).unwrap_or_default(),
        output_format: parse_enum(obj.get("outputFormat")).unwrap_or_default(),
        output_compression,
        background: parse_enum(obj.get("background")).unwrap_or_default(),
        allow_prompt_adjustment: obj.get("allowPromptAdjustment") == Some(&Value::Bool(true)),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// The strict function definition the planner forces the model to call.
///
/// Every enumerated field is constrained here so that most invalid output
/// is rejected before it ever reaches [`validate`].
pub fn plan_tool() -> ToolDefinition {
    ToolDefinition {
        name: PLAN_FUNCTION.into(),
        description: "Decide how the agent responds to the latest chat message.".into(),
        parameters: plan_schema(),
        strict: true,
    }
}

pub fn plan_schema() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["action", "modality", "reaction", "openaiOptions", "presence", "imageRequest", "riskTier"],
        "properties": {
            "action": {
                "type": "string",
                "enum": ["message", "react", "ignore", "image"],
                "description": "message: reply in text or speech; react: add one emoji; ignore: stay silent; image: generate an image"
            },
            "modality": { "type": "string", "enum": ["text", "tts"] },
            "reaction": { "type": "string", "description": "Single emoji when action is react, otherwise empty" },
            "openaiOptions": {
                "type": "object",
                "additionalProperties": false,
                "required": ["reasoningEffort", "verbosity", "tool_choice", "webSearch", "ttsOptions"],
                "properties": {
                    "reasoningEffort": { "type": "string", "enum": ["minimal", "low", "medium", "high"] },
                    "verbosity": { "type": "string", "enum": ["low", "medium", "high"] },
                    "tool_choice": { "type": "string", "enum": ["none", "auto", "required"] },
                    "webSearch": {
                        "type": "object",
                        "additionalProperties": false,
                        "required": ["query", "allowedDomains", "searchContextSize"],
                        "properties": {
                            "query": { "type": "string" },
                            "allowedDomains": { "type": "array", "items": { "type": "string" } },
                            "searchContextSize": { "type": "string", "enum": ["low", "medium", "high"] }
                        }
                    },
                    "ttsOptions": {
                        "type": "object",
                        "additionalProperties": false,
                        "required": ["voice", "speed"],
                        "properties": {
                            "voice": { "type": "string" },
                            "speed": { "type": "number" }
                        }
                    }
                }
            },
            "presence": {
                "type": "object",
                "additionalProperties": false,
                "required": ["status", "activity"],
                "properties": {
                    "status": { "type": "string", "enum": ["online", "idle", "dnd", "invisible"] },
                    "activity": { "type": "string" }
                }
            },
            "imageRequest": {
                "type": "object",
                "additionalProperties": false,
                "required": ["prompt", "aspectRatio", "quality", "outputFormat", "outputCompression", "background", "allowPromptAdjustment"],
                "properties": {
                    "prompt": { "type": "string" },
                    "aspectRatio": { "type": "string", "enum": ["square", "portrait", "landscape", "auto"] },
                    "quality": { "type": "string", "enum": ["low", "medium", "high", "auto"] },
                    "outputFormat": { "type": "string", "enum": ["png", "jpeg", "webp"] },
                    "outputCompression": { "type": "integer", "minimum": 1, "maximum": 100 },
                    "background": { "type": "string", "enum": ["auto", "transparent", "opaque"] },
                    "allowPromptAdjustment": { "type": "boolean" }
                }
            },
            "riskTier": { "type": "string", "enum": ["Low", "Medium", "High"] }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_idempotent(raw: Value) {
        let once = validate(&raw);
        let twice = validate(&once.to_value());
        assert_eq!(once, twice, "not idempotent for {raw}");
    }

    #[test]
    fn empty_object_is_default_plan() {
        let plan = validate(&json!({}));
        assert_eq!(plan, Plan::ignore());
        assert!(!plan.is_actionable());
    }

    #[test]
    fn non_object_degrades_to_default() {
        assert_eq!(validate(&json!("message")), Plan::ignore());
        assert_eq!(validate(&json!([1, 2])), Plan::ignore());
        assert_eq!(validate(&Value::Null), Plan::ignore());
    }

    #[test]
    fn partial_nested_options_are_merged() {
        let plan = validate(&json!({
            "action": "message",
            "openaiOptions": { "verbosity": "high", "webSearch": { "query": "rust 2024 edition" } }
        }));
        assert_eq!(plan.action, PlanAction::Message);
        assert_eq!(plan.options.verbosity, Verbosity::High);
        assert_eq!(plan.options.reasoning_effort, ReasoningEffort::Low);
        assert_eq!(plan.options.web_search.query, "rust 2024 edition");
        assert_eq!(plan.options.web_search.search_context_size, SearchContextSize::Low);
        assert_eq!(plan.options.tts_options, TtsOptions::default());
    }

    #[test]
    fn unknown_action_becomes_ignore() {
        let plan = validate(&json!({ "action": "dance" }));
        assert_eq!(plan.action, PlanAction::Ignore);
    }

    #[test]
    fn action_is_case_insensitive() {
        let plan = validate(&json!({ "action": " Message " }));
        assert_eq!(plan.action, PlanAction::Message);
    }

    #[test]
    fn out_of_domain_enums_fall_back() {
        let plan = validate(&json!({
            "action": "message",
            "modality": "hologram",
            "openaiOptions": { "reasoningEffort": "extreme", "tool_choice": "always" }
        }));
        assert_eq!(plan.modality, Modality::Text);
        assert_eq!(plan.options.reasoning_effort, ReasoningEffort::Low);
        assert_eq!(plan.options.tool_choice, ToolChoiceMode::None);
    }

    #[test]
    fn risk_tier_coercion() {
        assert_eq!(validate(&json!({ "riskTier": "HIGH" })).risk_tier, RiskTier::High);
        assert_eq!(validate(&json!({ "riskTier": "medium" })).risk_tier, RiskTier::Medium);
        assert_eq!(validate(&json!({ "riskTier": "severe" })).risk_tier, RiskTier::Low);
        assert_eq!(validate(&json!({ "riskTier": 3 })).risk_tier, RiskTier::Low);
    }

    #[test]
    fn image_forces_text_and_strips_tools() {
        let plan = validate(&json!({
            "action": "image",
            "modality": "tts",
            "openaiOptions": {
                "tool_choice": "required",
                "webSearch": { "query": "cats" },
                "ttsOptions": { "voice": "nova" }
            },
            "imageRequest": { "prompt": "a cat in a hat" }
        }));
        assert_eq!(plan.modality, Modality::Text);
        assert_eq!(plan.options.tool_choice, ToolChoiceMode::None);
        assert!(!plan.options.web_search.is_requested());
        assert_eq!(plan.options.tts_options.voice, "alloy");
        match plan.action {
            PlanAction::Image { request } => assert_eq!(request.prompt, "a cat in a hat"),
            other => panic!("Expected image, got {other:?}"),
        }
    }

    #[test]
    fn image_request_normalization() {
        let plan = validate(&json!({
            "action": "image",
            "imageRequest": {
                "prompt": "sunset",
                "aspectRatio": "WIDE",
                "quality": "High",
                "outputFormat": "gif",
                "outputCompression": 450,
                "background": "transparent",
                "allowPromptAdjustment": "yes"
            }
        }));
        let PlanAction::Image { request } = plan.action else {
            panic!("expected image plan");
        };
        assert_eq!(request.aspect_ratio, AspectRatio::Auto);
        assert_eq!(request.quality, ImageQuality::High);
        assert_eq!(request.output_format, OutputFormat::Png);
        assert_eq!(request.output_compression, 100);
        assert_eq!(request.background, Background::Transparent);
        assert!(!request.allow_prompt_adjustment);
    }

    #[test]
    fn compression_clamped_low() {
        let plan = validate(&json!({
            "action": "image",
            "imageRequest": { "prompt": "x", "outputCompression": -20, "allowPromptAdjustment": true }
        }));
        let PlanAction::Image { request } = plan.action else {
            panic!("expected image plan");
        };
        assert_eq!(request.output_compression, 1);
        assert!(request.allow_prompt_adjustment);
    }

    #[test]
    fn image_without_prompt_degrades_to_message() {
        let plan = validate(&json!({ "action": "image", "imageRequest": { "prompt": "  " } }));
        assert_eq!(plan.action, PlanAction::Message);
    }

    #[test]
    fn react_without_reaction_uses_fallback() {
        let plan = validate_with(&json!({ "action": "react" }), "🤔");
        assert_eq!(
            plan.action,
            PlanAction::React {
                reaction: "🤔".into()
            }
        );
        let plan = validate(&json!({ "action": "react", "reaction": "🎉", "modality": "tts" }));
        assert_eq!(
            plan.action,
            PlanAction::React {
                reaction: "🎉".into()
            }
        );
        assert_eq!(plan.modality, Modality::Text);
    }

    #[test]
    fn message_keeps_tts() {
        let plan = validate(&json!({
            "action": "message",
            "modality": "tts",
            "openaiOptions": { "ttsOptions": { "voice": "nova", "speed": 9.0 } }
        }));
        assert_eq!(plan.modality, Modality::Tts);
        assert_eq!(plan.options.tts_options.voice, "nova");
        assert_eq!(plan.options.tts_options.speed, MAX_TTS_SPEED);
    }

    #[test]
    fn wrong_shaped_nested_fields_use_defaults() {
        let plan = validate(&json!({
            "action": "message",
            "openaiOptions": "fast please",
            "presence": 7,
            "imageRequest": null
        }));
        assert_eq!(plan.options, ModelOptions::default());
        assert_eq!(plan.presence, Presence::default());
    }

    #[test]
    fn validation_is_idempotent() {
        assert_idempotent(json!({}));
        assert_idempotent(json!({ "action": "react" }));
        assert_idempotent(json!({ "action": "image", "imageRequest": { "prompt": "p", "outputCompression": 33.6 } }));
        assert_idempotent(json!({ "action": "message", "modality": "TTS", "riskTier": "high" }));
        assert_idempotent(json!({
            "action": "message",
            "openaiOptions": { "webSearch": { "query": " q ", "allowedDomains": ["Docs.rs", "", 4] } },
            "presence": { "status": "dnd", "activity": " reading " }
        }));
        assert_idempotent(json!("garbage"));
    }

    #[test]
    fn fallback_plans() {
        assert_eq!(Plan::fallback(FallbackAction::Ignore, "👀"), Plan::ignore());
        assert_eq!(Plan::fallback(FallbackAction::React, "👀"), Plan::react("👀"));
        assert_eq!(
            Plan::fallback(FallbackAction::React, ""),
            Plan::react(DEFAULT_REACTION)
        );
    }

    #[test]
    fn wire_shape() {
        let value = Plan::react("👍").to_value();
        assert_eq!(value["action"], "react");
        assert_eq!(value["reaction"], "👍");
        assert_eq!(value["riskTier"], "Low");
        assert_eq!(value["openaiOptions"]["tool_choice"], "none");
        assert_eq!(value["openaiOptions"]["webSearch"]["searchContextSize"], "low");
        assert_eq!(value["imageRequest"]["outputCompression"], 100);
    }

    #[test]
    fn schema_constrains_enums() {
        let tool = plan_tool();
        assert_eq!(tool.name, PLAN_FUNCTION);
        assert!(tool.strict);
        let effort = &tool.parameters["properties"]["openaiOptions"]["properties"]["reasoningEffort"];
        assert_eq!(effort["enum"], json!(["minimal", "low", "medium", "high"]));
    }
}
