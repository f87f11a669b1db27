//! Strongly typed node configuration.
//!
//! Definitions arrive with a free-form `config` object per node. It is parsed
//! once, at validation time, into the [`NodeConfig`] variant for the node's
//! type. Fields that may carry `{{…}}` placeholders stay as raw strings (or
//! raw JSON for structured fields) until [`NodeConfig::resolve`] runs right
//! before dispatch.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::adapters::condition::Comparison;
use crate::template::{self, Variables};

// ---------------------------------------------------------------------------
// NodeKind
// ---------------------------------------------------------------------------

/// The closed set of node types the engine knows how to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    Trigger,
    Generate,
    AgentInvoke,
    Action,
    Condition,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trigger     => "trigger",
            Self::Generate    => "generate",
            Self::AgentInvoke => "agent-invoke",
            Self::Action      => "action",
            Self::Condition   => "condition",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trigger"      => Ok(Self::Trigger),
            "generate"     => Ok(Self::Generate),
            "agent-invoke" => Ok(Self::AgentInvoke),
            "action"       => Ok(Self::Action),
            "condition"    => Ok(Self::Condition),
            other          => Err(format!("unknown node type: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Branch decisions
// ---------------------------------------------------------------------------

/// What a condition node tells the coordinator to do next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BranchDecision {
    /// Continue with the node's normal successor.
    Proceed,
    /// Stop the traversal; the run completes.
    SkipRest,
    /// Continue at the named node.
    JumpTo(String),
}

impl BranchDecision {
    pub fn jump_target(&self) -> Option<&str> {
        match self {
            Self::JumpTo(key) => Some(key),
            _ => None,
        }
    }
}

impl fmt::Display for BranchDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Proceed     => f.write_str("proceed"),
            Self::SkipRest    => f.write_str("skip-rest"),
            Self::JumpTo(key) => write!(f, "jump-to:{key}"),
        }
    }
}

impl FromStr for BranchDecision {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "proceed"   => Ok(Self::Proceed),
            "skip-rest" => Ok(Self::SkipRest),
            other => match other.strip_prefix("jump-to:") {
                Some(key) if !key.trim().is_empty() => Ok(Self::JumpTo(key.trim().to_owned())),
                _ => Err(format!(
                    "invalid branch decision '{other}' (expected proceed, skip-rest or jump-to:<nodeKey>)"
                )),
            },
        }
    }
}

impl TryFrom<String> for BranchDecision {
    type Error = String;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<BranchDecision> for String {
    fn from(d: BranchDecision) -> Self {
        d.to_string()
    }
}

// ---------------------------------------------------------------------------
// Per-type configs
// ---------------------------------------------------------------------------

/// Output modality of a generate node. Doubles as the adapter operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Text,
    Image,
    Video,
}

impl Modality {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text  => "text",
            Self::Image => "image",
            Self::Video => "video",
        }
    }
}

impl FromStr for Modality {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text"  => Ok(Self::Text),
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            other   => Err(format!("unknown modality: {other}")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Values seeded into `trigger.*` unless the caller supplies them.
    #[serde(default)]
    pub defaults: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateConfig {
    pub modality: Modality,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,
    #[serde(default = "default_count")]
    pub count: u32,
    #[serde(default)]
    pub params: Map<String, Value>,
}

fn default_count() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentInvokeConfig {
    pub agent: String,
    pub operation: String,
    #[serde(default)]
    pub input: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionConfig {
    pub platform: String,
    pub content: String,
    /// A URL string, an array of URLs, or a `{{node.assets}}` reference.
    #[serde(default)]
    pub media: Value,
    /// Opaque reference to the connected account's stored credentials.
    pub account: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionConfig {
    pub expression: String,
    /// Operands resolved independently of the operator. Set by
    /// [`NodeConfig::resolve`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison: Option<Comparison>,
    #[serde(default = "default_if_true")]
    pub if_true: BranchDecision,
    #[serde(default = "default_if_false")]
    pub if_false: BranchDecision,
}

fn default_if_true() -> BranchDecision {
    BranchDecision::Proceed
}

fn default_if_false() -> BranchDecision {
    BranchDecision::SkipRest
}

// ---------------------------------------------------------------------------
// NodeConfig
// ---------------------------------------------------------------------------

/// Typed configuration, one variant per [`NodeKind`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NodeConfig {
    Trigger(TriggerConfig),
    Generate(GenerateConfig),
    AgentInvoke(AgentInvokeConfig),
    Action(ActionConfig),
    Condition(ConditionConfig),
}

impl NodeConfig {
    /// Parse a raw config object for the given node kind. `null` is treated
    /// as an empty object.
    pub fn parse(kind: NodeKind, raw: &Value) -> Result<Self, serde_json::Error> {
        let raw = if raw.is_null() { Value::Object(Map::new()) } else { raw.clone() };
        Ok(match kind {
            NodeKind::Trigger     => Self::Trigger(serde_json::from_value(raw)?),
            NodeKind::Generate    => Self::Generate(serde_json::from_value(raw)?),
            NodeKind::AgentInvoke => Self::AgentInvoke(serde_json::from_value(raw)?),
            NodeKind::Action      => Self::Action(serde_json::from_value(raw)?),
            NodeKind::Condition   => Self::Condition(serde_json::from_value(raw)?),
        })
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Trigger(_)     => NodeKind::Trigger,
            Self::Generate(_)    => NodeKind::Generate,
            Self::AgentInvoke(_) => NodeKind::AgentInvoke,
            Self::Action(_)      => NodeKind::Action,
            Self::Condition(_)   => NodeKind::Condition,
        }
    }

    /// Node keys this config can send the cursor to.
    pub fn jump_targets(&self) -> Vec<&str> {
        match self {
            Self::Condition(c) => [&c.if_true, &c.if_false]
                .into_iter()
                .filter_map(BranchDecision::jump_target)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Fill every template field from the namespace. Unresolved references
    /// are appended to `warnings`.
    pub fn resolve(&self, vars: &Variables, warnings: &mut Vec<String>) -> Self {
        match self {
            Self::Trigger(c) => Self::Trigger(TriggerConfig {
                defaults: template::resolve_map(&c.defaults, vars, warnings),
            }),
            Self::Generate(c) => Self::Generate(GenerateConfig {
                modality: c.modality,
                prompt: template::resolve_str(&c.prompt, vars, warnings),
                platform: c.platform.as_deref().map(|p| template::resolve_str(p, vars, warnings)),
                aspect_ratio: c.aspect_ratio.clone(),
                duration_seconds: c.duration_seconds,
                count: c.count,
                params: template::resolve_map(&c.params, vars, warnings),
            }),
            Self::AgentInvoke(c) => Self::AgentInvoke(AgentInvokeConfig {
                agent: c.agent.clone(),
                operation: c.operation.clone(),
                input: template::resolve_map(&c.input, vars, warnings),
            }),
            Self::Action(c) => Self::Action(ActionConfig {
                platform: template::resolve_str(&c.platform, vars, warnings),
                content: template::resolve_str(&c.content, vars, warnings),
                media: template::resolve_value(&c.media, vars, warnings),
                account: template::resolve_str(&c.account, vars, warnings),
            }),
            Self::Condition(c) => {
                let comparison = Comparison::parse(&c.expression).resolve(vars, warnings);
                Self::Condition(ConditionConfig {
                    expression: comparison.to_string(),
                    comparison: Some(comparison),
                    if_true: c.if_true.clone(),
                    if_false: c.if_false.clone(),
                })
            }
        }
    }

    /// The config as an adapter input map.
    pub fn to_inputs(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}
