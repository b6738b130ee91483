//! Plan generation via a forced function call.
//!
//! The model never answers in free text here: the request carries the strict
//! `plan_response` schema with `tool_choice` pinned to it, and the returned
//! arguments go through [`validate_with`]. Any failure along the way is
//! logged once and replaced by the configured fallback plan.

use std::sync::Arc;

use banter_config::PlannerConfig;
use banter_core::error::ProviderError;
use banter_core::message::Message;
use banter_core::metrics::UsageRecorder;
use banter_core::provider::{Provider, ProviderRequest, ProviderResponse, ToolChoice};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::context::EngagementContext;
use crate::plan::{PLAN_FUNCTION, Plan, plan_tool, validate_with};

/// Why the planner is being asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerReason {
    DirectAddress,
    Catchup,
}

impl TriggerReason {
    fn explain(self) -> &'static str {
        match self {
            Self::DirectAddress => {
                "You were addressed directly (mentioned or replied to). Respond unless doing so would be harmful."
            }
            Self::Catchup => {
                "Nobody addressed you, but the conversation has moved on since you last spoke. Join in only if you can add something; otherwise react or ignore."
            }
        }
    }
}

/// Where a plan came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanSource {
    Model,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedResponse {
    pub plan: Plan,
    pub source: PlanSource,
}

#[derive(Debug, Error)]
enum PlanError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("model did not call plan_response")]
    MissingCall,

    #[error("function arguments are not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("function arguments are not a JSON object")]
    NotAnObject,
}

pub struct PlanGenerator {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    history_window: usize,
    fallback: Plan,
    fallback_reaction: String,
    usage: Option<Arc<dyn UsageRecorder>>,
}

impl PlanGenerator {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, config: &PlannerConfig) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            history_window: config.history_window,
            fallback: Plan::fallback(config.fallback_action, &config.fallback_reaction),
            fallback_reaction: config.fallback_reaction.clone(),
            usage: None,
        }
    }

    /// Report token usage of every model call to `recorder`.
    pub fn with_usage_recorder(mut self, recorder: Arc<dyn UsageRecorder>) -> Self {
        self.usage = Some(recorder);
        self
    }

    /// Produce a validated plan; never fails.
    pub async fn generate_plan(&self, context: &EngagementContext, reason: TriggerReason) -> Plan {
        self.plan_with_source(context, reason).await.plan
    }

    /// Like [`generate_plan`](Self::generate_plan), also reporting whether
    /// the model or the fallback produced the plan.
    pub async fn plan_with_source(
        &self,
        context: &EngagementContext,
        reason: TriggerReason,
    ) -> PlannedResponse {
        match self.request_plan(context, reason).await {
            Ok(plan) => {
                info!(
                    channel = %context.channel_key,
                    reason = ?reason,
                    action = plan.action.name(),
                    risk = ?plan.risk_tier,
                    "Plan generated"
                );
                PlannedResponse {
                    plan,
                    source: PlanSource::Model,
                }
            }
            Err(e) => {
                warn!(
                    channel = %context.channel_key,
                    reason = ?reason,
                    error = %e,
                    "Plan generation failed, using fallback plan"
                );
                PlannedResponse {
                    plan: self.fallback.clone(),
                    source: PlanSource::Fallback,
                }
            }
        }
    }

    async fn request_plan(
        &self,
        context: &EngagementContext,
        reason: TriggerReason,
    ) -> Result<Plan, PlanError> {
        let request = self.build_request(context, reason);
        let response = self.provider.complete(request).await?;
        self.record_usage(context, &response);

        let call = response
            .message
            .tool_call(PLAN_FUNCTION)
            .ok_or(PlanError::MissingCall)?;
        let raw: serde_json::Value = serde_json::from_str(&call.arguments)?;
        if !raw.is_object() {
            return Err(PlanError::NotAnObject);
        }
        Ok(validate_with(&raw, &self.fallback_reaction))
    }

    fn record_usage(&self, context: &EngagementContext, response: &ProviderResponse) {
        let (Some(recorder), Some(usage)) = (&self.usage, &response.usage) else {
            return;
        };
        let model = if response.model.is_empty() {
            &self.model
        } else {
            &response.model
        };
        recorder.record_model_call(&context.channel_key, model, usage);
    }

    pub(crate) fn build_request(
        &self,
        context: &EngagementContext,
        reason: TriggerReason,
    ) -> ProviderRequest {
        let mut messages = Vec::with_capacity(self.history_window + 3);
        messages.push(Message::system(system_prompt(context)));

        let skip = context.recent.len().saturating_sub(self.history_window);
        for past in context.recent.iter().skip(skip) {
            if context.agent.is_self(&past.author.id) {
                messages.push(Message::assistant(past.content.clone()));
            } else {
                messages.push(Message::user(format!("{}: {}", past.author.name, past.content)));
            }
        }

        messages.push(Message::user(format!(
            "{}: {}",
            context.message.author.name, context.message.content
        )));
        messages.push(Message::system(format!(
            "Trigger: {}\nCall {PLAN_FUNCTION} to decide how to respond to the last message.",
            reason.explain()
        )));

        ProviderRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: Some(self.max_tokens),
            tools: vec![plan_tool()],
            tool_choice: ToolChoice::Function(PLAN_FUNCTION.into()),
        }
    }
}

fn system_prompt(context: &EngagementContext) -> String {
    let place = if context.is_dm {
        "a direct message conversation"
    } else {
        "a group chat"
    };
    format!(
        "You are {name}, a participant in {place}. You do not write the reply here; \
         you only decide what kind of response fits. Prefer 'ignore' when you have \
         nothing to add, 'react' for acknowledgements, 'message' for answers, and \
         'image' only when someone asks for a picture. Use 'tts' only when a spoken \
         reply was requested. Rate how sensitive the topic is in riskTier.",
        name = context.agent.display_name(),
    )
}
