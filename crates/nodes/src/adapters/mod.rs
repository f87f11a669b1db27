//! Capability adapters: one uniform call surface over heterogeneous backends.
//!
//! Every adapter takes an operation name plus resolved inputs and returns an
//! output with a cost estimate. Failures are normalized to [`AdapterError`].
//! Adapters are stateless per call and never touch the run namespace.

pub mod agent;
pub mod condition;
pub mod generation;
pub mod publish;

use std::future::Future;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::AdapterError;

pub use agent::{
    AgentAdapter, AgentProfile, AgentRegistry, CompletionRequest, CompletionResponse,
    LanguageModelProvider, TokenUsage,
};
pub use condition::{Comparison, ConditionAdapter, Operator};
pub use generation::{
    Asset, GenerationAdapter, GenerationProvider, GenerationRates, GenerationRequest,
    GenerationResponse, Usage,
};
pub use publish::{
    PublishAdapter, PublishFailure, PublishReceipt, PublishRequest, Publisher, PublisherSet,
};

/// Result of a successful adapter call.
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterOutput {
    pub output: Value,
    pub cost_estimate: f64,
    /// Non-fatal notes raised while building the call, e.g. unresolved
    /// prompt references.
    pub warnings: Vec<String>,
}

impl AdapterOutput {
    pub fn new(output: Value, cost_estimate: f64) -> Self {
        Self { output, cost_estimate, warnings: Vec::new() }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }
}

#[async_trait]
pub trait CapabilityAdapter: Send + Sync {
    /// Invoke `operation` with resolved inputs. Must return
    /// [`AdapterErrorKind::Cancelled`](crate::AdapterErrorKind::Cancelled)
    /// promptly once `cancel` fires.
    async fn invoke(
        &self,
        operation: &str,
        inputs: &Map<String, Value>,
        cancel: &CancellationToken,
    ) -> Result<AdapterOutput, AdapterError>;
}

/// Race a provider call against the cancellation signal.
pub async fn cancellable<T, F>(cancel: &CancellationToken, call: F) -> Result<T, AdapterError>
where
    F: Future<Output = Result<T, AdapterError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AdapterError::cancelled()),
        result = call => result,
    }
}

/// Deserialize adapter inputs into a typed request.
pub(crate) fn parse_inputs<T: DeserializeOwned>(
    inputs: &Map<String, Value>,
) -> Result<T, AdapterError> {
    serde_json::from_value(Value::Object(inputs.clone()))
        .map_err(|e| AdapterError::invalid_input(format!("malformed inputs: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn cancellable_returns_cancelled_when_token_fires() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let result: Result<(), _> = cancellable(&cancel, async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        })
        .await;

        assert!(result.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn cancellable_passes_through_results() {
        let cancel = CancellationToken::new();
        let result = cancellable(&cancel, async { Ok::<_, AdapterError>(7) }).await;
        assert_eq!(result, Ok(7));
    }
}
