//! Where finished runs are persisted. The engine never writes state itself;
//! callers plug in a sink (database row, log file, queue) and the executor
//! hands it every result through [`crate::WorkflowExecutor::execute_and_record`].

use std::sync::Mutex;

use async_trait::async_trait;

use crate::ExecutionResult;

#[async_trait]
pub trait ExecutionSink: Send + Sync {
    /// Persist one execution record. Failures are logged by the caller and
    /// never change the result.
    async fn record(&self, result: &ExecutionResult) -> anyhow::Result<()>;
}

/// Keeps every recorded result in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    results: Mutex<Vec<ExecutionResult>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> Vec<ExecutionResult> {
        self.results.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ExecutionSink for MemorySink {
    async fn record(&self, result: &ExecutionResult) -> anyhow::Result<()> {
        self.results
            .lock()
            .map_err(|_| anyhow::anyhow!("memory sink lock poisoned"))?
            .push(result.clone());
        Ok(())
    }
}
