//! Named agent profiles backed by a language-model provider.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{cancellable, parse_inputs, AdapterOutput, CapabilityAdapter};
use crate::template;
use crate::{AdapterError, AgentInvokeConfig};

/// A preconfigured language-model invocation target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub name: String,
    pub system_prompt: String,
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Price per 1000 input tokens.
    #[serde(default)]
    pub input_cost_per_1k: f64,
    /// Price per 1000 output tokens.
    #[serde(default)]
    pub output_cost_per_1k: f64,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1024
}

impl AgentProfile {
    pub fn cost(&self, usage: &TokenUsage) -> f64 {
        usage.input_tokens as f64 / 1000.0 * self.input_cost_per_1k
            + usage.output_tokens as f64 / 1000.0 * self.output_cost_per_1k
    }
}

/// Read-only lookup of agent profiles and their per-operation prompts.
///
/// Built once at startup and shared; nothing mutates it during a run.
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    profiles: HashMap<String, AgentProfile>,
    prompts: HashMap<(String, String), String>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(mut self, profile: AgentProfile) -> Self {
        self.profiles.insert(profile.name.clone(), profile);
        self
    }

    /// Register the user-prompt template for `(agent, operation)`. The
    /// template sees the node's resolved input map as `{{input.*}}`.
    pub fn with_prompt(
        mut self,
        agent: impl Into<String>,
        operation: impl Into<String>,
        template: impl Into<String>,
    ) -> Self {
        self.prompts.insert((agent.into(), operation.into()), template.into());
        self
    }

    pub fn profile(&self, name: &str) -> Option<&AgentProfile> {
        self.profiles.get(name)
    }

    pub fn prompt(&self, agent: &str, operation: &str) -> Option<&str> {
        self.prompts
            .get(&(agent.to_owned(), operation.to_owned()))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub text: String,
    pub usage: TokenUsage,
}

/// External language-model backend.
#[async_trait]
pub trait LanguageModelProvider: Send + Sync {
    async fn complete(&self, request: CompletionRequest)
        -> Result<CompletionResponse, AdapterError>;
}

pub struct AgentAdapter {
    registry: Arc<AgentRegistry>,
    provider: Arc<dyn LanguageModelProvider>,
}

impl AgentAdapter {
    pub fn new(registry: Arc<AgentRegistry>, provider: Arc<dyn LanguageModelProvider>) -> Self {
        Self { registry, provider }
    }

    /// Deterministic prompt for `(agent, operation)` over the given input.
    /// Unresolved `{{input.*}}` references are appended to `warnings`.
    pub fn render_prompt(
        &self,
        agent: &str,
        operation: &str,
        input: &Map<String, Value>,
        warnings: &mut Vec<String>,
    ) -> Result<String, AdapterError> {
        let template = self.registry.prompt(agent, operation).ok_or_else(|| {
            AdapterError::invalid_input(format!(
                "agent '{agent}' has no prompt for operation '{operation}'"
            ))
        })?;

        let mut vars = Map::new();
        vars.insert("input".into(), Value::Object(input.clone()));
        Ok(template::resolve_str(template, &vars, warnings))
    }
}

#[async_trait]
impl CapabilityAdapter for AgentAdapter {
    async fn invoke(
        &self,
        operation: &str,
        inputs: &Map<String, Value>,
        cancel: &CancellationToken,
    ) -> Result<AdapterOutput, AdapterError> {
        let config: AgentInvokeConfig = parse_inputs(inputs)?;
        let profile = self
            .registry
            .profile(&config.agent)
            .ok_or_else(|| {
                AdapterError::invalid_input(format!("unknown agent '{}'", config.agent))
            })?;

        let mut warnings = Vec::new();
        let user_prompt =
            self.render_prompt(&config.agent, operation, &config.input, &mut warnings)?;
        let request = CompletionRequest {
            system_prompt: profile.system_prompt.clone(),
            user_prompt,
            model: profile.model.clone(),
            temperature: profile.temperature,
            max_tokens: profile.max_tokens,
        };

        let response = cancellable(cancel, self.provider.complete(request)).await?;
        let cost = profile.cost(&response.usage);

        debug!(
            agent = %config.agent,
            operation,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            cost,
            "agent call complete"
        );

        Ok(AdapterOutput::new(parse_structured(&response.text), cost).with_warnings(warnings))
    }
}

/// Parse model output as JSON, tolerating a surrounding Markdown code fence.
/// Falls back to the raw text.
pub fn parse_structured(text: &str) -> Value {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed);

    serde_json::from_str(body).unwrap_or_else(|_| Value::String(text.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockLanguageModel;
    use crate::AdapterErrorKind;
    use serde_json::json;

    fn registry() -> Arc<AgentRegistry> {
        Arc::new(
            AgentRegistry::new()
                .with_profile(AgentProfile {
                    name: "editor".into(),
                    system_prompt: "You edit social posts.".into(),
                    model: "model-large".into(),
                    temperature: 0.2,
                    max_tokens: 500,
                    input_cost_per_1k: 0.003,
                    output_cost_per_1k: 0.015,
                })
                .with_prompt("editor", "score", "Score this draft: {{input.draft}}"),
        )
    }

    fn inputs(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn structured_output_and_token_pricing() {
        let llm = Arc::new(MockLanguageModel::new());
        llm.push_ok("```json\n{\"score\": 8}\n```", 2000, 1000);
        let adapter = AgentAdapter::new(registry(), llm.clone());

        let out = adapter
            .invoke(
                "score",
                &inputs(json!({ "agent": "editor", "operation": "score", "input": { "draft": "Hello" } })),
                &CancellationToken::new(),
            )
            .await
            .expect("agent call succeeds");

        assert_eq!(out.output, json!({ "score": 8 }));
        // 2000/1000 * 0.003 + 1000/1000 * 0.015
        assert!((out.cost_estimate - 0.021).abs() < 1e-9);

        let seen = llm.requests();
        assert_eq!(seen[0].system_prompt, "You edit social posts.");
        assert_eq!(seen[0].user_prompt, "Score this draft: Hello");
        assert_eq!(seen[0].model, "model-large");
        assert_eq!(seen[0].max_tokens, 500);
    }

    #[tokio::test]
    async fn unresolved_prompt_references_come_back_as_warnings() {
        let llm = Arc::new(MockLanguageModel::new());
        llm.push_ok("{\"score\": 5}", 10, 5);
        let adapter = AgentAdapter::new(registry(), llm.clone());

        let out = adapter
            .invoke(
                "score",
                &inputs(json!({ "agent": "editor", "operation": "score", "input": { "text": "Hello" } })),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(llm.requests()[0].user_prompt, "Score this draft: ");
        assert_eq!(out.warnings.len(), 1);
        assert!(out.warnings[0].contains("input.draft"));
    }

    #[tokio::test]
    async fn unparseable_output_is_returned_raw() {
        let llm = Arc::new(MockLanguageModel::new());
        llm.push_ok("Looks great!", 10, 5);
        let adapter = AgentAdapter::new(registry(), llm);

        let out = adapter
            .invoke(
                "score",
                &inputs(json!({ "agent": "editor", "operation": "score", "input": { "draft": "x" } })),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(out.output, json!("Looks great!"));
    }

    #[tokio::test]
    async fn unknown_agent_or_operation_is_invalid_input() {
        let adapter = AgentAdapter::new(registry(), Arc::new(MockLanguageModel::new()));
        let cancel = CancellationToken::new();

        let err = adapter
            .invoke("score", &inputs(json!({ "agent": "ghost", "operation": "score" })), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::InvalidInput);

        let err = adapter
            .invoke("translate", &inputs(json!({ "agent": "editor", "operation": "translate" })), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::InvalidInput);
    }

    #[test]
    fn parse_structured_handles_plain_json_and_fences() {
        assert_eq!(parse_structured("[1, 2]"), json!([1, 2]));
        assert_eq!(parse_structured("```\n{\"a\":1}\n```"), json!({ "a": 1 }));
        assert_eq!(parse_structured("not json"), json!("not json"));
    }
}
