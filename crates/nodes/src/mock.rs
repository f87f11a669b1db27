//! Test doubles for executors and external providers.
//!
//! Useful in unit and integration tests where a real provider is either
//! unavailable or irrelevant. Every double records the calls it receives and
//! replays a programmer-specified script; once a script is down to its last
//! step that step repeats.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::adapters::{
    Asset, CompletionRequest, CompletionResponse, GenerationProvider, GenerationRequest,
    GenerationResponse, LanguageModelProvider, PublishFailure, PublishReceipt, PublishRequest,
    Publisher, TokenUsage, Usage,
};
use crate::traits::{ExecutionContext, NodeOutput};
use crate::{AdapterError, ExecutableNode, NodeConfig};

fn next_step<T: Clone>(script: &mut VecDeque<T>) -> Option<T> {
    if script.len() > 1 {
        script.pop_front()
    } else {
        script.front().cloned()
    }
}

// ---------------------------------------------------------------------------
// MockNode
// ---------------------------------------------------------------------------

/// One scripted response.
#[derive(Debug, Clone)]
pub enum MockStep {
    Return { output: Value, cost: f64 },
    Fail(AdapterError),
}

/// An executor whose behaviour is scripted per node key.
///
/// Nodes without a script return `{"node": <key>}` at zero cost.
#[derive(Default)]
pub struct MockNode {
    scripts: Mutex<HashMap<String, VecDeque<MockStep>>>,
    delay: Option<Duration>,
    /// Every `(node_key, resolved config)` seen, in call order.
    pub calls: Arc<Mutex<Vec<(String, NodeConfig)>>>,
}

impl MockNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a successful response to `node_key`'s script.
    pub fn returning(self, node_key: impl Into<String>, output: Value, cost: f64) -> Self {
        self.push(node_key, MockStep::Return { output, cost })
    }

    /// Append a failure to `node_key`'s script.
    pub fn failing(self, node_key: impl Into<String>, error: AdapterError) -> Self {
        self.push(node_key, MockStep::Fail(error))
    }

    /// Sleep before every response. The sleep honours cancellation.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn push(self, node_key: impl Into<String>, step: MockStep) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(node_key.into())
            .or_default()
            .push_back(step);
        self
    }

    /// Number of times any node has been executed.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Number of times `node_key` has been executed.
    pub fn calls_for(&self, node_key: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|(k, _)| k == node_key).count()
    }

    /// Resolved configs `node_key` was called with.
    pub fn configs_for(&self, node_key: &str) -> Vec<NodeConfig> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| k == node_key)
            .map(|(_, c)| c.clone())
            .collect()
    }
}

#[async_trait]
impl ExecutableNode for MockNode {
    async fn execute(
        &self,
        config: &NodeConfig,
        ctx: &ExecutionContext,
    ) -> Result<NodeOutput, AdapterError> {
        self.calls.lock().unwrap().push((ctx.node_key.clone(), config.clone()));

        if let Some(delay) = self.delay {
            tokio::select! {
                _ = ctx.cancel.cancelled() => return Err(AdapterError::cancelled()),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        let step = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&ctx.node_key)
            .and_then(next_step);

        match step {
            Some(MockStep::Return { output, cost }) => Ok(NodeOutput::new(output, cost)),
            Some(MockStep::Fail(err)) => Err(err),
            None => Ok(NodeOutput::free(json!({ "node": ctx.node_key }))),
        }
    }
}

// ---------------------------------------------------------------------------
// MockGenerationProvider
// ---------------------------------------------------------------------------

/// Without a script, echoes the prompt as a single text asset with
/// 10 input / 20 output tokens (or one media unit).
#[derive(Default)]
pub struct MockGenerationProvider {
    script: Mutex<VecDeque<Result<GenerationResponse, AdapterError>>>,
    requests: Mutex<Vec<GenerationRequest>>,
    delay: Option<Duration>,
}

impl MockGenerationProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_ok(&self, response: GenerationResponse) {
        self.script.lock().unwrap().push_back(Ok(response));
    }

    pub fn push_err(&self, error: AdapterError) {
        self.script.lock().unwrap().push_back(Err(error));
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationProvider for MockGenerationProvider {
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, AdapterError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = next_step(&mut self.script.lock().unwrap());
        scripted.unwrap_or_else(|| {
            Ok(match request.modality {
                crate::Modality::Text => GenerationResponse {
                    assets: vec![Asset::text(format!("generated: {}", request.prompt))],
                    usage: Usage { input_tokens: 10, output_tokens: 20, units: 0 },
                    safety_flags: vec![],
                },
                _ => GenerationResponse {
                    assets: vec![Asset::media("https://cdn.example/asset-1", "application/octet-stream")],
                    usage: Usage { units: 1, ..Usage::default() },
                    safety_flags: vec![],
                },
            })
        })
    }
}

// ---------------------------------------------------------------------------
// MockLanguageModel
// ---------------------------------------------------------------------------

/// Without a script, echoes the user prompt with 10 / 10 token usage.
#[derive(Default)]
pub struct MockLanguageModel {
    script: Mutex<VecDeque<Result<CompletionResponse, AdapterError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockLanguageModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ok(&self, text: impl Into<String>, input_tokens: u64, output_tokens: u64) {
        self.script.lock().unwrap().push_back(Ok(CompletionResponse {
            text: text.into(),
            usage: TokenUsage { input_tokens, output_tokens },
        }));
    }

    pub fn push_err(&self, error: AdapterError) {
        self.script.lock().unwrap().push_back(Err(error));
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModelProvider for MockLanguageModel {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, AdapterError> {
        self.requests.lock().unwrap().push(request.clone());
        let scripted = next_step(&mut self.script.lock().unwrap());
        scripted.unwrap_or_else(|| {
            Ok(CompletionResponse {
                text: request.user_prompt,
                usage: TokenUsage { input_tokens: 10, output_tokens: 10 },
            })
        })
    }
}

// ---------------------------------------------------------------------------
// MockPublisher
// ---------------------------------------------------------------------------

/// Without a script, accepts every post and numbers them `post-1`, `post-2`, …
#[derive(Default)]
pub struct MockPublisher {
    script: Mutex<VecDeque<Result<PublishReceipt, PublishFailure>>>,
    requests: Mutex<Vec<PublishRequest>>,
}

impl MockPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_err(&self, failure: PublishFailure) {
        self.script.lock().unwrap().push_back(Err(failure));
    }

    pub fn push_ok(&self, receipt: PublishReceipt) {
        self.script.lock().unwrap().push_back(Ok(receipt));
    }

    pub fn requests(&self) -> Vec<PublishRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    async fn publish(&self, request: PublishRequest) -> Result<PublishReceipt, PublishFailure> {
        let count = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };
        let scripted = next_step(&mut self.script.lock().unwrap());
        scripted.unwrap_or_else(|| {
            Ok(PublishReceipt {
                platform_post_id: format!("post-{count}"),
                url: format!("https://social.example/p/post-{count}"),
            })
        })
    }
}
