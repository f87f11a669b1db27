//! Maps node kinds to executors.

use std::collections::HashMap;
use std::sync::Arc;

use crate::adapters::{
    AgentAdapter, AgentRegistry, ConditionAdapter, GenerationAdapter, GenerationProvider,
    GenerationRates, LanguageModelProvider, PublishAdapter, PublisherSet,
};
use crate::builtin::{ActionNode, AgentInvokeNode, ConditionNode, GenerateNode, TriggerNode};
use crate::{ExecutableNode, NodeKind};

/// External collaborators the built-in executors are wired to.
#[derive(Clone)]
pub struct Capabilities {
    pub generation: Arc<dyn GenerationProvider>,
    pub language_model: Arc<dyn LanguageModelProvider>,
    pub publishers: PublisherSet,
    pub agents: Arc<AgentRegistry>,
    pub rates: GenerationRates,
}

/// Executor lookup used by the coordinator. Cheap to clone.
#[derive(Clone, Default)]
pub struct NodeRegistry {
    executors: HashMap<NodeKind, Arc<dyn ExecutableNode>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All five built-in executors over the given capabilities.
    pub fn builtin(caps: Capabilities) -> Self {
        let generation = Arc::new(GenerationAdapter::new(caps.generation, caps.rates));
        let agent = Arc::new(AgentAdapter::new(caps.agents, caps.language_model));
        let publish = Arc::new(PublishAdapter::new(caps.publishers));
        let condition = Arc::new(ConditionAdapter::new());

        Self::new()
            .with(NodeKind::Trigger, Arc::new(TriggerNode))
            .with(NodeKind::Generate, Arc::new(GenerateNode::new(generation)))
            .with(NodeKind::AgentInvoke, Arc::new(AgentInvokeNode::new(agent)))
            .with(NodeKind::Action, Arc::new(ActionNode::new(publish)))
            .with(NodeKind::Condition, Arc::new(ConditionNode::new(condition)))
    }

    /// Register (or replace) the executor for `kind`.
    pub fn with(mut self, kind: NodeKind, executor: Arc<dyn ExecutableNode>) -> Self {
        self.executors.insert(kind, executor);
        self
    }

    pub fn get(&self, kind: NodeKind) -> Option<&Arc<dyn ExecutableNode>> {
        self.executors.get(&kind)
    }

    pub fn contains(&self, kind: NodeKind) -> bool {
        self.executors.contains_key(&kind)
    }
}
