//! Settings file loading.
//!
//! ```toml
//! [executor]
//! retry_base_delay_ms = 1000
//! retry_transient_only = false
//!
//! [env]
//! BRAND = "Acme"
//! API_REGION = "${REGION}"
//!
//! [rates]
//! text_input_per_1k = 0.0005
//! text_output_per_1k = 0.0015
//! image_per_unit = 0.04
//! video_per_second = 0.10
//!
//! [[agents]]
//! name = "copywriter"
//! system_prompt = "You write short social posts."
//! model = "gpt-4o-mini"
//! input_cost_per_1k = 0.00015
//! output_cost_per_1k = 0.0006
//!
//! [agents.prompts]
//! caption = "Write a caption about {{input.topic}}."
//! ```
//!
//! `${VAR}` references anywhere in the file are replaced from the process
//! environment before parsing; unset variables are left as written.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use nodes::adapters::{AgentProfile, AgentRegistry, GenerationRates};

use crate::ExecutorConfig;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings file not found: {0}")]
    NotFound(String),

    #[error("invalid settings: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub executor: ExecutorSettings,
    /// Exposed to templates as `{{env.*}}`.
    #[serde(default)]
    pub env: Map<String, Value>,
    #[serde(default)]
    pub rates: GenerationRates,
    #[serde(default)]
    pub agents: Vec<AgentSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorSettings {
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default)]
    pub retry_transient_only: bool,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_transient_only: false,
        }
    }
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

/// An agent profile plus its prompt templates keyed by operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(flatten)]
    pub profile: AgentProfile,
    #[serde(default)]
    pub prompts: HashMap<String, String>,
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| SettingsError::NotFound(path.display().to_string()))?;
        Self::parse(&content)
    }

    /// Parse settings from TOML text, expanding `${VAR}` first.
    pub fn parse(content: &str) -> Result<Self, SettingsError> {
        let expanded = expand_env_vars(content);
        toml::from_str(&expanded).map_err(|e| SettingsError::Parse(e.to_string()))
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            retry_base_delay: Duration::from_millis(self.executor.retry_base_delay_ms),
            retry_transient_only: self.executor.retry_transient_only,
        }
    }

    pub fn agent_registry(&self) -> AgentRegistry {
        self.agents.iter().fold(AgentRegistry::new(), |registry, agent| {
            let name = agent.profile.name.clone();
            let registry = registry.with_profile(agent.profile.clone());
            agent
                .prompts
                .iter()
                .fold(registry, |r, (op, template)| {
                    r.with_prompt(name.clone(), op.clone(), template.clone())
                })
        })
    }

    pub fn env_map(&self) -> Map<String, Value> {
        self.env.clone()
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                name.push(c);
            }
            match std::env::var(&name) {
                Ok(val) => result.push_str(&val),
                Err(_) => result.push_str(&format!("${{{name}}}")),
            }
        } else {
            result.push(c);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let settings = Settings::parse("").unwrap();
        assert_eq!(settings.executor.retry_base_delay_ms, 1000);
        assert_eq!(settings.executor_config().retry_base_delay, Duration::from_secs(1));
        assert!(!settings.executor_config().retry_transient_only);
        assert!(settings.env.is_empty());
        assert!(settings.agent_registry().is_empty());
    }

    #[test]
    fn unset_variables_are_left_verbatim() {
        assert_eq!(
            expand_env_vars("key = \"${CONTENTFLOW_SURELY_UNSET_VAR}\""),
            "key = \"${CONTENTFLOW_SURELY_UNSET_VAR}\""
        );
        assert_eq!(expand_env_vars("cost = $5"), "cost = $5");
    }

    #[test]
    fn transient_only_retries_can_be_enabled() {
        let settings = Settings::parse("[executor]\nretry_transient_only = true\n").unwrap();
        assert!(settings.executor_config().retry_transient_only);
        assert_eq!(settings.executor.retry_base_delay_ms, 1000);
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        assert!(matches!(Settings::parse("[executor"), Err(SettingsError::Parse(_))));
    }
}
