//! The `ExecutableNode` trait, the contract every node executor must fulfil.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::adapters::AdapterOutput;
use crate::{AdapterError, BranchDecision, NodeConfig};

/// Per-dispatch context handed to an executor.
///
/// Defined here (in the nodes crate) so both the engine and individual
/// executors can import it without a circular dependency.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// ID of the workflow definition being run.
    pub workflow_id: String,
    /// ID of the current execution run.
    pub execution_id: uuid::Uuid,
    /// Key of the node being executed.
    pub node_key: String,
    /// Inputs supplied by the caller when the run was started.
    pub initial_inputs: Map<String, Value>,
    /// Fires when the run is cancelled, times out or exhausts its budget.
    pub cancel: CancellationToken,
}

/// What a successful executor hands back to the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeOutput {
    /// Stored under the node's key in the run namespace.
    pub output: Value,
    /// Spend attributed to this call.
    pub cost: f64,
    /// Set by condition nodes only.
    pub branch: Option<BranchDecision>,
    /// Appended to the node result's warnings.
    pub warnings: Vec<String>,
}

impl NodeOutput {
    pub fn new(output: Value, cost: f64) -> Self {
        Self { output, cost, branch: None, warnings: Vec::new() }
    }

    pub fn free(output: Value) -> Self {
        Self::new(output, 0.0)
    }

    pub fn with_branch(mut self, branch: BranchDecision) -> Self {
        self.branch = Some(branch);
        self
    }
}

impl From<AdapterOutput> for NodeOutput {
    fn from(out: AdapterOutput) -> Self {
        Self { output: out.output, cost: out.cost_estimate, branch: None, warnings: out.warnings }
    }
}

/// The core executor trait, implemented once per node type.
#[async_trait]
pub trait ExecutableNode: Send + Sync {
    /// Execute the node with its already-resolved config.
    async fn execute(
        &self,
        config: &NodeConfig,
        ctx: &ExecutionContext,
    ) -> Result<NodeOutput, AdapterError>;
}
