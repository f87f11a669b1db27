//! Turns a finished [`RunContext`] into the immutable [`ExecutionResult`]
//! handed back to the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use nodes::{NodeResult, NodeStatus};

use crate::{RunContext, RunError};

/// Run lifecycle. `Pending` and `Running` never appear in a returned result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    /// The traversal ran out of nodes or a condition ended it early.
    Completed,
    /// A critical node failed (or any node, in strict mode).
    Failed,
    /// Stopped by a run-level limit or caller cancellation.
    Aborted,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Aborted)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub execution_id: Uuid,
    pub workflow_id: String,
    /// True iff the run reached `Completed`, even with failed nodes.
    pub success: bool,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    pub total_cost: f64,
    pub duration_ms: u64,
    pub nodes_executed: u32,
    pub nodes_failed: u32,
    /// Present iff `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RunError>,
    pub node_results: Vec<NodeResult>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ExecutionResult {
    /// The log entry for `node_key`, if the node appears in it.
    pub fn node(&self, node_key: &str) -> Option<&NodeResult> {
        self.node_results.iter().find(|r| r.node_key == node_key)
    }
}

/// Build the caller-facing result. Pure apart from reading the clock for
/// `finished_at`.
pub fn record(
    ctx: RunContext,
    status: RunStatus,
    error: Option<RunError>,
    output_node: Option<&str>,
) -> ExecutionResult {
    let success = status == RunStatus::Completed && error.is_none();
    let output = select_output(&ctx.node_results, output_node);

    ExecutionResult {
        execution_id: ctx.execution_id,
        workflow_id: ctx.workflow_id.clone(),
        success,
        status,
        output,
        total_cost: ctx.cumulative_cost,
        duration_ms: ctx.elapsed().as_millis() as u64,
        nodes_executed: ctx.nodes_executed(),
        nodes_failed: ctx.nodes_failed(),
        error,
        node_results: ctx.node_results,
        started_at: ctx.started_at_utc,
        finished_at: Utc::now(),
    }
}

/// The designated node's output when it succeeded, otherwise the last
/// successful node's output.
fn select_output(results: &[NodeResult], output_node: Option<&str>) -> Option<Value> {
    let succeeded = |r: &&NodeResult| r.status == NodeStatus::Success;
    match output_node {
        Some(key) => results
            .iter()
            .filter(succeeded)
            .find(|r| r.node_key == key)
            .and_then(|r| r.output.clone()),
        None => results.iter().rev().find(succeeded).and_then(|r| r.output.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RunErrorKind;
    use nodes::{AdapterError, NodeKind};
    use serde_json::{json, Map};

    fn context() -> RunContext {
        let mut ctx = RunContext::new("wf", Map::new());
        let topic = json!({ "topic": "AI" });
        ctx.record(NodeResult::success("start", NodeKind::Trigger, topic, 0.0, 0, 1));
        let draft = json!({ "text": "hi" });
        ctx.record(NodeResult::success("draft", NodeKind::Generate, draft, 0.02, 10, 1));
        let down = AdapterError::unavailable("down");
        ctx.record(NodeResult::failed("post", NodeKind::Action, down, 5, 1));
        ctx
    }

    #[test]
    fn completed_run_with_failures_is_still_successful() {
        let result = record(context(), RunStatus::Completed, None, None);
        assert!(result.success);
        assert_eq!(result.nodes_executed, 2);
        assert_eq!(result.nodes_failed, 1);
        assert_eq!(result.output, Some(json!({ "text": "hi" })));
        assert!((result.total_cost - 0.02).abs() < 1e-9);
        assert!(result.error.is_none());
    }

    #[test]
    fn output_node_selects_a_specific_output() {
        let result = record(context(), RunStatus::Completed, None, Some("start"));
        assert_eq!(result.output, Some(json!({ "topic": "AI" })));

        // A designated node that did not succeed yields no output.
        let result = record(context(), RunStatus::Completed, None, Some("post"));
        assert_eq!(result.output, None);
    }

    #[test]
    fn aborted_run_carries_its_error() {
        let err = RunError::new(RunErrorKind::BudgetExceeded, "spent").at("post");
        let result = record(context(), RunStatus::Aborted, Some(err.clone()), None);
        assert!(!result.success);
        assert_eq!(result.error, Some(err));
        assert!(result.status.is_terminal());
    }

    #[test]
    fn result_serializes_with_snake_case_status() {
        let result = record(RunContext::new("wf", Map::new()), RunStatus::Completed, None, None);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["status"], "completed");
        assert_eq!(value["nodes_executed"], 0);
        assert!(value.get("output").is_none());
        assert!(value.get("error").is_none());
    }
}
