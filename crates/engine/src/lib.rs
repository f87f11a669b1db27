//! `engine` crate: workflow definitions, plan validation and the run
//! coordinator.

pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod graph;
pub mod models;
pub mod recorder;
pub mod sink;

pub use config::{Settings, SettingsError};
pub use context::RunContext;
pub use error::{EngineError, RunError, RunErrorKind};
pub use executor::{ExecutorConfig, WorkflowExecutor};
pub use graph::{build_plan, ExecutionPlan};
pub use models::{Position, WorkflowDefinition, WorkflowNode};
pub use recorder::{ExecutionResult, RunStatus};
pub use sink::{ExecutionSink, MemorySink};
