//! Per-run mutable state, owned by the coordinator for the duration of one
//! execution and discarded once the result is recorded.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tokio::time::Instant;
use uuid::Uuid;

use nodes::{NodeResult, NodeStatus, Variables};

#[derive(Debug)]
pub struct RunContext {
    pub execution_id: Uuid,
    pub workflow_id: String,
    /// `trigger.*`, `env.*` and one entry per successful node.
    pub variables: Variables,
    pub cumulative_cost: f64,
    pub started_at: Instant,
    pub started_at_utc: DateTime<Utc>,
    /// Ordered per-node log.
    pub node_results: Vec<NodeResult>,
}

impl RunContext {
    pub fn new(workflow_id: impl Into<String>, env: Map<String, Value>) -> Self {
        let mut variables = Variables::new();
        variables.insert("env".into(), Value::Object(env));

        Self {
            execution_id: Uuid::new_v4(),
            workflow_id: workflow_id.into(),
            variables,
            cumulative_cost: 0.0,
            started_at: Instant::now(),
            started_at_utc: Utc::now(),
            node_results: Vec::new(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Time left before `timeout`; zero once exceeded.
    pub fn remaining(&self, timeout: Duration) -> Duration {
        timeout.saturating_sub(self.elapsed())
    }

    /// Store a node's output under its namespace key.
    pub fn merge_output(&mut self, key: &str, output: Value) {
        self.variables.insert(key.to_owned(), output);
    }

    pub fn record(&mut self, result: NodeResult) {
        self.cumulative_cost += result.cost;
        self.node_results.push(result);
    }

    pub fn nodes_executed(&self) -> u32 {
        self.count(NodeStatus::Success)
    }

    pub fn nodes_failed(&self) -> u32 {
        self.count(NodeStatus::Failed)
    }

    pub fn has_result_for(&self, node_key: &str) -> bool {
        self.node_results.iter().any(|r| r.node_key == node_key)
    }

    fn count(&self, status: NodeStatus) -> u32 {
        self.node_results.iter().filter(|r| r.status == status).count() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodes::NodeKind;
    use serde_json::json;

    #[test]
    fn env_is_seeded_into_the_namespace() {
        let mut env = Map::new();
        env.insert("BRAND".into(), json!("Acme"));
        let ctx = RunContext::new("wf", env);
        assert_eq!(ctx.variables["env"]["BRAND"], "Acme");
        assert_eq!(ctx.cumulative_cost, 0.0);
    }

    #[test]
    fn recording_accumulates_cost_and_counts() {
        let mut ctx = RunContext::new("wf", Map::new());
        ctx.record(NodeResult::success("a", NodeKind::Generate, json!({}), 0.25, 5, 1));
        let down = nodes::AdapterError::unavailable("down");
        ctx.record(NodeResult::failed("b", NodeKind::Action, down, 5, 3));
        ctx.record(NodeResult::skipped("c", NodeKind::Generate));

        assert!((ctx.cumulative_cost - 0.25).abs() < 1e-9);
        assert_eq!(ctx.nodes_executed(), 1);
        assert_eq!(ctx.nodes_failed(), 1);
        assert!(ctx.has_result_for("c"));
    }

    #[tokio::test(start_paused = true)]
    async fn remaining_time_saturates() {
        let ctx = RunContext::new("wf", Map::new());
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(ctx.remaining(Duration::from_secs(3)), Duration::ZERO);
        assert_eq!(ctx.remaining(Duration::from_secs(8)), Duration::from_secs(3));
    }
}
