//! Built-in executors, one per [`NodeKind`](crate::NodeKind).
//!
//! Executors are thin: they check that the config variant matches, pick the
//! adapter operation and shape the adapter output into a [`NodeOutput`].

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::adapters::CapabilityAdapter;
use crate::traits::{ExecutionContext, NodeOutput};
use crate::{AdapterError, BranchDecision, ExecutableNode, NodeConfig};

fn mismatch(expected: &str, config: &NodeConfig) -> AdapterError {
    AdapterError::invalid_input(format!(
        "{expected} executor received a {} config",
        config.kind()
    ))
}

// ---------------------------------------------------------------------------
// Trigger
// ---------------------------------------------------------------------------

/// Seeds `trigger.*`: config defaults overlaid by the caller's inputs.
#[derive(Debug, Default)]
pub struct TriggerNode;

#[async_trait]
impl ExecutableNode for TriggerNode {
    async fn execute(
        &self,
        config: &NodeConfig,
        ctx: &ExecutionContext,
    ) -> Result<NodeOutput, AdapterError> {
        let NodeConfig::Trigger(trigger) = config else {
            return Err(mismatch("trigger", config));
        };

        let mut seeded = trigger.defaults.clone();
        for (key, value) in &ctx.initial_inputs {
            seeded.insert(key.clone(), value.clone());
        }

        Ok(NodeOutput::free(Value::Object(seeded)))
    }
}

// ---------------------------------------------------------------------------
// Generate
// ---------------------------------------------------------------------------

pub struct GenerateNode {
    adapter: Arc<dyn CapabilityAdapter>,
}

impl GenerateNode {
    pub fn new(adapter: Arc<dyn CapabilityAdapter>) -> Self {
        Self { adapter }
    }
}

#[async_trait]
impl ExecutableNode for GenerateNode {
    async fn execute(
        &self,
        config: &NodeConfig,
        ctx: &ExecutionContext,
    ) -> Result<NodeOutput, AdapterError> {
        let NodeConfig::Generate(generate) = config else {
            return Err(mismatch("generate", config));
        };

        let out = self
            .adapter
            .invoke(generate.modality.as_str(), &config.to_inputs(), &ctx.cancel)
            .await?;
        Ok(NodeOutput::from(out))
    }
}

// ---------------------------------------------------------------------------
// Agent invoke
// ---------------------------------------------------------------------------

pub struct AgentInvokeNode {
    adapter: Arc<dyn CapabilityAdapter>,
}

impl AgentInvokeNode {
    pub fn new(adapter: Arc<dyn CapabilityAdapter>) -> Self {
        Self { adapter }
    }
}

#[async_trait]
impl ExecutableNode for AgentInvokeNode {
    async fn execute(
        &self,
        config: &NodeConfig,
        ctx: &ExecutionContext,
    ) -> Result<NodeOutput, AdapterError> {
        let NodeConfig::AgentInvoke(agent) = config else {
            return Err(mismatch("agent-invoke", config));
        };

        let out = self
            .adapter
            .invoke(&agent.operation, &config.to_inputs(), &ctx.cancel)
            .await?;
        Ok(NodeOutput::from(out))
    }
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// Publishes and stores the platform receipt as the node output.
pub struct ActionNode {
    adapter: Arc<dyn CapabilityAdapter>,
}

impl ActionNode {
    pub fn new(adapter: Arc<dyn CapabilityAdapter>) -> Self {
        Self { adapter }
    }
}

#[async_trait]
impl ExecutableNode for ActionNode {
    async fn execute(
        &self,
        config: &NodeConfig,
        ctx: &ExecutionContext,
    ) -> Result<NodeOutput, AdapterError> {
        if !matches!(config, NodeConfig::Action(_)) {
            return Err(mismatch("action", config));
        }

        let out = self
            .adapter
            .invoke("publish", &config.to_inputs(), &ctx.cancel)
            .await?;
        Ok(NodeOutput::from(out))
    }
}

// ---------------------------------------------------------------------------
// Condition
// ---------------------------------------------------------------------------

/// Evaluates the expression and hands the branch decision to the coordinator.
pub struct ConditionNode {
    adapter: Arc<dyn CapabilityAdapter>,
}

impl ConditionNode {
    pub fn new(adapter: Arc<dyn CapabilityAdapter>) -> Self {
        Self { adapter }
    }
}

#[async_trait]
impl ExecutableNode for ConditionNode {
    async fn execute(
        &self,
        config: &NodeConfig,
        ctx: &ExecutionContext,
    ) -> Result<NodeOutput, AdapterError> {
        if !matches!(config, NodeConfig::Condition(_)) {
            return Err(mismatch("condition", config));
        }

        let out = self
            .adapter
            .invoke("evaluate", &config.to_inputs(), &ctx.cancel)
            .await?;

        let decision: BranchDecision = out
            .output
            .get("decision")
            .and_then(Value::as_str)
            .ok_or_else(|| AdapterError::invalid_input("condition produced no decision"))?
            .parse()
            .map_err(AdapterError::invalid_input)?;

        Ok(NodeOutput::from(out).with_branch(decision))
    }
}
