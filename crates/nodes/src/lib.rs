//! `nodes` crate: node executors, capability adapters and template resolution.
//!
//! Every node type has an [`ExecutableNode`] implementation that reaches its
//! external capability through a [`CapabilityAdapter`]. The engine crate
//! dispatches execution through the [`NodeRegistry`].

pub mod adapters;
pub mod builtin;
pub mod config;
pub mod error;
pub mod mock;
pub mod registry;
pub mod result;
pub mod template;
pub mod traits;

pub use adapters::{AdapterOutput, CapabilityAdapter};
pub use config::{
    ActionConfig, AgentInvokeConfig, BranchDecision, ConditionConfig, GenerateConfig, Modality,
    NodeConfig, NodeKind, TriggerConfig,
};
pub use error::{AdapterError, AdapterErrorKind};
pub use registry::{Capabilities, NodeRegistry};
pub use result::{NodeResult, NodeStatus};
pub use template::Variables;
pub use traits::{ExecutableNode, ExecutionContext, NodeOutput};
