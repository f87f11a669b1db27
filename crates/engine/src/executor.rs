//! Workflow execution engine.
//!
//! `WorkflowExecutor` is the run coordinator:
//! 1. Validates the definition and builds its execution plan.
//! 2. Runs the trigger to seed `trigger.*`.
//! 3. Walks the successor graph one node at a time, checking cancellation,
//!    the run timeout and the cost budget before each dispatch.
//! 4. Resolves each node's config against the run namespace, dispatches it
//!    and retries failures with exponential back-off.
//! 5. Follows condition branch decisions.
//! 6. Hands the finished context to the result recorder.
//!
//! Node failures are recorded and the walk continues unless the node is
//! critical or the workflow runs in strict mode. Nothing in here returns an
//! error to the caller: every outcome is an [`ExecutionResult`].

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, field, info, instrument, warn, Span};

use nodes::traits::{ExecutionContext, NodeOutput};
use nodes::{
    AdapterError, AdapterErrorKind, BranchDecision, ExecutableNode, NodeConfig, NodeKind,
    NodeRegistry, NodeResult,
};

use crate::graph::{build_plan, ExecutionPlan, PlannedNode};
use crate::recorder::{self, ExecutionResult, RunStatus};
use crate::{EngineError, ExecutionSink, RunContext, RunError, RunErrorKind, WorkflowDefinition};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning knobs for the executor. Per-run limits live on the definition.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Base delay for exponential back-off between retries.
    pub retry_base_delay: Duration,
    /// Only retry rate limits and provider outages. Off by default: every
    /// failure except cancellation is retried.
    pub retry_transient_only: bool,
}

impl ExecutorConfig {
    fn should_retry(&self, err: &AdapterError) -> bool {
        if err.is_cancelled() {
            return false;
        }
        !self.retry_transient_only || err.is_retryable()
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            retry_base_delay: Duration::from_secs(1),
            retry_transient_only: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Per-node dispatch outcome
// ---------------------------------------------------------------------------

enum Dispatch {
    Succeeded(Option<BranchDecision>),
    Failed(AdapterError),
    TimedOut,
    Cancelled,
}

// ---------------------------------------------------------------------------
// WorkflowExecutor
// ---------------------------------------------------------------------------

/// Stateless orchestrator. One executor can serve any number of concurrent
/// runs; each run owns its own [`RunContext`].
pub struct WorkflowExecutor {
    registry: NodeRegistry,
    config: ExecutorConfig,
    env: Map<String, Value>,
    sink: Option<Arc<dyn ExecutionSink>>,
}

impl WorkflowExecutor {
    pub fn new(registry: NodeRegistry, config: ExecutorConfig) -> Self {
        Self { registry, config, env: Map::new(), sink: None }
    }

    /// Values exposed to templates as `{{env.*}}`.
    pub fn with_env(mut self, env: Map<String, Value>) -> Self {
        self.env = env;
        self
    }

    /// Record every finished run through `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn ExecutionSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Validate `def` and check that every node kind it uses has an
    /// executor registered.
    pub fn plan(&self, def: &WorkflowDefinition) -> Result<ExecutionPlan, EngineError> {
        let plan = build_plan(def)?;
        if let Some(node) = plan.nodes.iter().find(|n| !self.registry.contains(n.kind)) {
            return Err(EngineError::MissingExecutor(node.kind.to_string()));
        }
        Ok(plan)
    }

    /// Run the workflow to completion.
    pub async fn execute(
        &self,
        def: &WorkflowDefinition,
        inputs: Map<String, Value>,
    ) -> ExecutionResult {
        self.execute_with_cancel(def, inputs, CancellationToken::new()).await
    }

    /// Run the workflow, then hand the result to `sink` as well as any
    /// configured sink. A sink failure is logged and does not change the
    /// returned result.
    pub async fn execute_and_record(
        &self,
        def: &WorkflowDefinition,
        inputs: Map<String, Value>,
        sink: &dyn ExecutionSink,
    ) -> ExecutionResult {
        let result = self.execute(def, inputs).await;
        persist(sink, &result).await;
        result
    }

    /// Run the workflow until it finishes or `cancel` fires.
    pub async fn execute_with_cancel(
        &self,
        def: &WorkflowDefinition,
        inputs: Map<String, Value>,
        cancel: CancellationToken,
    ) -> ExecutionResult {
        let result = self.run(def, inputs, cancel).await;
        if let Some(sink) = &self.sink {
            persist(sink.as_ref(), &result).await;
        }
        result
    }

    #[instrument(
        skip(self, def, inputs, cancel),
        fields(workflow_id = %def.id, execution_id = field::Empty)
    )]
    async fn run(
        &self,
        def: &WorkflowDefinition,
        inputs: Map<String, Value>,
        cancel: CancellationToken,
    ) -> ExecutionResult {
        let mut ctx = RunContext::new(def.id.clone(), self.env.clone());
        Span::current().record("execution_id", field::display(ctx.execution_id));

        // ------------------------------------------------------------------
        // Validate and plan.
        // ------------------------------------------------------------------
        let plan = match self.plan(def) {
            Ok(plan) => plan,
            Err(e) => {
                error!("workflow '{}' rejected: {}", def.id, e);
                return recorder::record(ctx, RunStatus::Failed, Some(e.into()), None);
            }
        };
        info!("plan built, default path: {:?}", plan.default_path());

        // Aborting a run cancels this token; the caller's token cancels it too.
        let token = cancel.child_token();
        let timeout = Duration::from_secs(def.timeout_seconds);

        ctx.merge_output("trigger", Value::Object(inputs.clone()));

        // ------------------------------------------------------------------
        // Seed: the trigger runs first and is exempt from the budget check.
        // ------------------------------------------------------------------
        let mut status = RunStatus::Running;
        let mut run_error: Option<RunError> = None;

        if let Some(t) = plan.trigger {
            let node = &plan.nodes[t];
            let outcome = match check_limits(def, &ctx, &token, node, timeout, false) {
                Some(err) => Err((RunStatus::Aborted, err)),
                None => {
                    let dispatched =
                        self.dispatch(def, node, &mut ctx, &inputs, &token, timeout).await;
                    settle(def, node, dispatched, timeout).map(drop)
                }
            };
            if let Err((stopped, err)) = outcome {
                status = stopped;
                run_error = Some(err);
            }
        }

        // ------------------------------------------------------------------
        // Walk the successor graph.
        // ------------------------------------------------------------------
        let mut visited: HashSet<usize> = HashSet::new();
        let mut cursor = if status == RunStatus::Running { plan.entry } else { None };

        while let Some(i) = cursor {
            let node = &plan.nodes[i];

            if let Some(err) = check_limits(def, &ctx, &token, node, timeout, true) {
                warn!("run aborted before node '{}': {}", node.key, err);
                status = RunStatus::Aborted;
                run_error = Some(err);
                break;
            }
            visited.insert(i);

            let dispatched = self.dispatch(def, node, &mut ctx, &inputs, &token, timeout).await;
            let branch = match settle(def, node, dispatched, timeout) {
                Ok(branch) => branch,
                Err((stopped, err)) => {
                    status = stopped;
                    run_error = Some(err);
                    break;
                }
            };

            cursor = match branch {
                None | Some(BranchDecision::Proceed) => node.successor,
                Some(BranchDecision::SkipRest) => {
                    info!("condition '{}' ended the run early", node.key);
                    None
                }
                Some(BranchDecision::JumpTo(target)) => match plan.index_of(&target) {
                    Some(j) if !visited.contains(&j) && Some(j) != plan.trigger => {
                        info!("condition '{}' jumped to '{}'", node.key, target);
                        Some(j)
                    }
                    _ => {
                        status = RunStatus::Failed;
                        run_error = Some(
                            RunError::new(
                                RunErrorKind::ConfigError,
                                format!("invalid jump target '{target}'"),
                            )
                            .at(&node.key),
                        );
                        break;
                    }
                },
            };
        }

        if status == RunStatus::Running {
            status = RunStatus::Completed;
        } else {
            token.cancel();
        }

        // ------------------------------------------------------------------
        // Every node not visited is logged as skipped.
        // ------------------------------------------------------------------
        for node in &plan.nodes {
            if !ctx.has_result_for(&node.key) {
                ctx.record(NodeResult::skipped(&node.key, node.kind));
            }
        }

        let result = recorder::record(ctx, status, run_error, def.output_node.as_deref());
        match &result.error {
            None => info!(
                "workflow '{}' execution {} completed: {} executed, {} failed, cost {:.4}",
                def.id,
                result.execution_id,
                result.nodes_executed,
                result.nodes_failed,
                result.total_cost
            ),
            Some(e) => error!(
                "workflow '{}' execution {} {:?}: {}",
                def.id, result.execution_id, result.status, e
            ),
        }
        result
    }

    // -----------------------------------------------------------------------
    // Internal: dispatch one node and record its result.
    // -----------------------------------------------------------------------

    async fn dispatch(
        &self,
        def: &WorkflowDefinition,
        node: &PlannedNode,
        ctx: &mut RunContext,
        inputs: &Map<String, Value>,
        token: &CancellationToken,
        timeout: Duration,
    ) -> Dispatch {
        let mut warnings = Vec::new();
        let config = node.config.resolve(&ctx.variables, &mut warnings);

        let node_ctx = ExecutionContext {
            workflow_id: def.id.clone(),
            execution_id: ctx.execution_id,
            node_key: node.key.clone(),
            initial_inputs: inputs.clone(),
            cancel: token.clone(),
        };

        let started = Instant::now();
        let mut attempts = 0u32;

        let outcome = match self.registry.get(node.kind) {
            Some(executor) => {
                let executor = executor.clone();
                let attempt_loop = self.execute_with_retry(
                    def,
                    &node.key,
                    executor.as_ref(),
                    &config,
                    &node_ctx,
                    &mut attempts,
                );
                tokio::time::timeout(ctx.remaining(timeout), attempt_loop).await
            }
            None => Ok(Err(AdapterError::invalid_input(format!(
                "no executor for '{}'",
                node.kind
            )))),
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(out)) => {
                let NodeOutput { output, cost, branch, warnings: node_warnings } = out;
                for warning in node_warnings {
                    if !warnings.contains(&warning) {
                        warnings.push(warning);
                    }
                }
                if node.kind == NodeKind::Trigger {
                    ctx.merge_output("trigger", output.clone());
                }
                ctx.merge_output(&node.key, output.clone());
                info!("node '{}' succeeded (cost {:.4}, attempts {})", node.key, cost, attempts);
                ctx.record(
                    NodeResult::success(&node.key, node.kind, output, cost, duration_ms, attempts)
                        .with_warnings(warnings),
                );
                Dispatch::Succeeded(branch)
            }

            Ok(Err(e)) => {
                error!("node '{}' failed after {} attempt(s): {}", node.key, attempts, e);
                ctx.record(
                    NodeResult::failed(&node.key, node.kind, e.clone(), duration_ms, attempts)
                        .with_warnings(warnings),
                );
                if token.is_cancelled() {
                    Dispatch::Cancelled
                } else {
                    Dispatch::Failed(e)
                }
            }

            Err(_elapsed) => {
                token.cancel();
                error!("node '{}' exceeded the run timeout", node.key);
                let e = AdapterError::new(
                    AdapterErrorKind::Cancelled,
                    "run timed out during node execution",
                );
                ctx.record(
                    NodeResult::failed(&node.key, node.kind, e, duration_ms, attempts.max(1))
                        .with_warnings(warnings),
                );
                Dispatch::TimedOut
            }
        }
    }

    // -----------------------------------------------------------------------
    // Internal: execute a single node with retry logic.
    // -----------------------------------------------------------------------

    async fn execute_with_retry(
        &self,
        def: &WorkflowDefinition,
        node_key: &str,
        node: &dyn ExecutableNode,
        config: &NodeConfig,
        ctx: &ExecutionContext,
        attempts: &mut u32,
    ) -> Result<NodeOutput, AdapterError> {
        loop {
            *attempts += 1;

            match node.execute(config, ctx).await {
                Ok(output) => return Ok(output),

                Err(err) => {
                    let retries_used = *attempts - 1;
                    if !def.retry_on_failure
                        || retries_used >= def.max_retries
                        || !self.config.should_retry(&err)
                    {
                        return Err(err);
                    }

                    let delay = self
                        .config
                        .retry_base_delay
                        .checked_mul(2u32.saturating_pow(retries_used))
                        .unwrap_or(Duration::MAX);

                    warn!(
                        "node '{}' failed (attempt {}/{}), retrying in {:?}: {}",
                        node_key,
                        *attempts,
                        def.max_retries + 1,
                        delay,
                        err
                    );

                    tokio::select! {
                        _ = ctx.cancel.cancelled() => return Err(AdapterError::cancelled()),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }
}

async fn persist(sink: &dyn ExecutionSink, result: &ExecutionResult) {
    if let Err(e) = sink.record(result).await {
        warn!(execution_id = %result.execution_id, "failed to record execution: {e:#}");
    }
}

// ---------------------------------------------------------------------------
// Pre-dispatch checks and run-level errors
// ---------------------------------------------------------------------------

/// What a dispatch means for the run: `Ok` carries the branch decision (if
/// any) and the walk goes on, `Err` stops it.
fn settle(
    def: &WorkflowDefinition,
    node: &PlannedNode,
    dispatched: Dispatch,
    timeout: Duration,
) -> Result<Option<BranchDecision>, (RunStatus, RunError)> {
    match dispatched {
        Dispatch::Succeeded(branch) => Ok(branch),
        Dispatch::Failed(e) if node.critical || def.strict_mode => {
            Err((RunStatus::Failed, node_failed(node, &e)))
        }
        Dispatch::Failed(_) => Ok(None),
        Dispatch::TimedOut => Err((RunStatus::Aborted, timed_out(node, timeout))),
        Dispatch::Cancelled => Err((RunStatus::Aborted, cancelled(node))),
    }
}

/// Cancellation, then timeout, then (unless exempt) budget.
fn check_limits(
    def: &WorkflowDefinition,
    ctx: &RunContext,
    token: &CancellationToken,
    node: &PlannedNode,
    timeout: Duration,
    enforce_budget: bool,
) -> Option<RunError> {
    if token.is_cancelled() {
        return Some(cancelled(node));
    }
    if ctx.elapsed() >= timeout {
        return Some(timed_out(node, timeout));
    }
    if enforce_budget && ctx.cumulative_cost >= def.max_cost_per_run {
        return Some(
            RunError::new(
                RunErrorKind::BudgetExceeded,
                format!(
                    "cumulative cost {:.4} reached max_cost_per_run {:.4}",
                    ctx.cumulative_cost, def.max_cost_per_run
                ),
            )
            .at(&node.key),
        );
    }
    None
}

fn timed_out(node: &PlannedNode, timeout: Duration) -> RunError {
    RunError::new(
        RunErrorKind::Timeout,
        format!("run exceeded {}s timeout", timeout.as_secs()),
    )
    .at(&node.key)
}

fn cancelled(node: &PlannedNode) -> RunError {
    RunError::new(RunErrorKind::Cancelled, "run cancelled").at(&node.key)
}

fn node_failed(node: &PlannedNode, err: &AdapterError) -> RunError {
    let reason = if node.critical { "critical node" } else { "node (strict mode)" };
    RunError::new(
        RunErrorKind::NodeFailed,
        format!("{reason} '{}' failed: {err}", node.key),
    )
    .at(&node.key)
}
