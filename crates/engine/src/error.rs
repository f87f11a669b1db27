//! Engine-level error types.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A malformed definition. Raised before any node executes.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    /// Two or more nodes share the same key.
    #[error("duplicate node key: '{0}'")]
    DuplicateNodeKey(String),

    /// `node_type` is not one of the known kinds.
    #[error("node '{node_key}' has unknown type '{node_type}'")]
    UnknownNodeType { node_key: String, node_type: String },

    /// The config could not be parsed into the node type's typed config.
    #[error("node '{node_key}' has invalid config: {message}")]
    InvalidNodeConfig { node_key: String, message: String },

    /// More than one trigger node.
    #[error("workflow has more than one trigger node ('{first}', '{second}')")]
    MultipleTriggers { first: String, second: String },

    /// A `next` pointer, jump target or output node names a missing node.
    #[error("'{referenced_by}' references unknown node '{node_key}'")]
    UnknownNodeReference {
        node_key: String,
        referenced_by: String,
    },

    /// `trigger` and `env` are namespace roots, not node keys.
    #[error("node key '{0}' is reserved")]
    ReservedNodeKey(String),

    /// The successor/jump graph is not acyclic.
    #[error("workflow graph contains a cycle through '{0}'")]
    CycleDetected(String),

    /// Budget or timeout outside the accepted range.
    #[error("invalid run limits: {0}")]
    InvalidLimits(String),

    /// No executor registered for a kind used by the definition.
    #[error("no executor registered for node type '{0}'")]
    MissingExecutor(String),
}

/// Why a run did not complete successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunErrorKind {
    ConfigError,
    BudgetExceeded,
    Timeout,
    Cancelled,
    /// A critical node failed, or any node failed in strict mode.
    NodeFailed,
}

impl fmt::Display for RunErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigError    => write!(f, "config_error"),
            Self::BudgetExceeded => write!(f, "budget_exceeded"),
            Self::Timeout        => write!(f, "timeout"),
            Self::Cancelled      => write!(f, "cancelled"),
            Self::NodeFailed     => write!(f, "node_failed"),
        }
    }
}

/// Run-level error carried in `ExecutionResult::error`.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct RunError {
    pub kind: RunErrorKind,
    pub message: String,
    /// The node being dispatched (or about to be) when the run stopped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_key: Option<String>,
}

impl RunError {
    pub fn new(kind: RunErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), node_key: None }
    }

    pub fn at(mut self, node_key: impl Into<String>) -> Self {
        self.node_key = Some(node_key.into());
        self
    }
}

impl From<EngineError> for RunError {
    fn from(err: EngineError) -> Self {
        RunError::new(RunErrorKind::ConfigError, err.to_string())
    }
}
