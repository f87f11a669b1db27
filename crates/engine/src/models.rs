//! Workflow definition models.
//!
//! These types are what a caller hands the engine for every run, whether the
//! definition came from a stored workflow or a built-in template. They carry
//! no behaviour; [`crate::graph::build_plan`] validates them and parses each
//! node's config into its typed form.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// WorkflowNode
// ---------------------------------------------------------------------------

/// Editor layout metadata. Ignored by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A single step in the workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowNode {
    /// Unique key within the definition; also the namespace key of the
    /// node's output.
    pub node_key: String,
    /// `trigger | generate | agent-invoke | action | condition`.
    pub node_type: String,
    /// Raw configuration. String values may contain `{{…}}` placeholders.
    #[serde(default)]
    pub config: Value,
    /// A failure of this node fails the whole run.
    #[serde(default)]
    pub critical: bool,
    /// Explicit successor. Defaults to the next node in definition order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

impl WorkflowNode {
    pub fn new(node_key: impl Into<String>, node_type: impl Into<String>, config: Value) -> Self {
        Self {
            node_key: node_key.into(),
            node_type: node_type.into(),
            config,
            critical: false,
            next: None,
            position: None,
        }
    }

    pub fn critical(mut self) -> Self {
        self.critical = true;
        self
    }

    pub fn with_next(mut self, next: impl Into<String>) -> Self {
        self.next = Some(next.into());
        self
    }
}

// ---------------------------------------------------------------------------
// WorkflowDefinition
// ---------------------------------------------------------------------------

/// A complete workflow definition plus its run-level limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: String,
    pub name: String,
    /// Order is execution order and the implicit dependency order.
    pub nodes: Vec<WorkflowNode>,
    /// Ceiling on cumulative spend; reaching it aborts the run.
    pub max_cost_per_run: f64,
    /// Wall-clock ceiling for the whole run.
    pub timeout_seconds: u64,
    #[serde(default)]
    pub retry_on_failure: bool,
    /// Retries allowed per failing node (attempts = retries + 1).
    #[serde(default)]
    pub max_retries: u32,
    /// Any node failure fails the run.
    #[serde(default)]
    pub strict_mode: bool,
    /// Node whose output becomes the run output. Defaults to the last
    /// successful node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_node: Option<String>,
}

impl WorkflowDefinition {
    /// Convenience constructor: $1.00 budget, 300 s timeout, no retries.
    pub fn new(id: impl Into<String>, name: impl Into<String>, nodes: Vec<WorkflowNode>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            nodes,
            max_cost_per_run: 1.0,
            timeout_seconds: 300,
            retry_on_failure: false,
            max_retries: 0,
            strict_mode: false,
            output_node: None,
        }
    }

    pub fn with_budget(mut self, max_cost_per_run: f64) -> Self {
        self.max_cost_per_run = max_cost_per_run;
        self
    }

    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.retry_on_failure = true;
        self.max_retries = max_retries;
        self
    }

    pub fn strict(mut self) -> Self {
        self.strict_mode = true;
        self
    }

    pub fn with_output_node(mut self, node_key: impl Into<String>) -> Self {
        self.output_node = Some(node_key.into());
        self
    }
}
