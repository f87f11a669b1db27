//! Uniform per-node record kept in the run log.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{AdapterError, NodeKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Success,
    Failed,
    Skipped,
}

/// One entry in `RunContext::node_results`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeResult {
    pub node_key: String,
    pub node_type: NodeKind,
    pub status: NodeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<AdapterError>,
    pub cost: f64,
    pub duration_ms: u64,
    /// Number of executor calls made, including the successful one.
    pub attempts: u32,
    /// Non-fatal notes such as unresolved template references.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl NodeResult {
    pub fn success(
        node_key: impl Into<String>,
        node_type: NodeKind,
        output: Value,
        cost: f64,
        duration_ms: u64,
        attempts: u32,
    ) -> Self {
        Self {
            node_key: node_key.into(),
            node_type,
            status: NodeStatus::Success,
            output: Some(output),
            error: None,
            cost,
            duration_ms,
            attempts,
            warnings: Vec::new(),
        }
    }

    pub fn failed(
        node_key: impl Into<String>,
        node_type: NodeKind,
        error: AdapterError,
        duration_ms: u64,
        attempts: u32,
    ) -> Self {
        Self {
            node_key: node_key.into(),
            node_type,
            status: NodeStatus::Failed,
            output: None,
            error: Some(error),
            cost: 0.0,
            duration_ms,
            attempts,
            warnings: Vec::new(),
        }
    }

    pub fn skipped(node_key: impl Into<String>, node_type: NodeKind) -> Self {
        Self {
            node_key: node_key.into(),
            node_type,
            status: NodeStatus::Skipped,
            output: None,
            error: None,
            cost: 0.0,
            duration_ms: 0,
            attempts: 0,
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }
}
