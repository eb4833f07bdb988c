//! Tool pipeline: the top-level orchestrator.
//!
//! Turns a user request into a validated plan (or accepts one from the
//! caller), schedules its steps respecting dependencies and the
//! parallelism cap, enforces per-step and whole-pipeline deadlines, and
//! aggregates per-step outcomes into an [`ExecutionResult`].
//!
//! Failure policy:
//!
//! - Planning failures abort the execution with [`PipelineError::Planning`].
//!   The pipeline never degrades into running the raw request as a command.
//! - Step failures never abort the pipeline; they are captured into
//!   [`StepResult::error`]. By default the first failure stops dependents
//!   (recorded as `PrerequisiteFailed`) while independent steps finish;
//!   with `continue_on_error` every step runs and `success` still reports
//!   whether all of them succeeded.
//! - On the whole-pipeline deadline, running steps are cancelled and
//!   recorded as timeouts; completed results are preserved.

use crate::ports::model_gateway::ModelGateway;
use crate::ports::telemetry::{NoTelemetry, TelemetryEvent, TelemetrySink};
use crate::ports::tool_executor::ToolExecutorPort;
use crate::use_cases::planning::plan_with_gateway;
use relay_domain::execution::{ExecutionContext, ExecutionOptions, ExecutionResult};
use relay_domain::plan::entities::Plan;
use relay_domain::plan::parser::PlanningError;
use relay_domain::plan::schedule;
use relay_domain::tool::entities::ToolCatalog;
use relay_domain::tool::value_objects::{StepError, StepResult};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Fatal, execution-level failures.
///
/// Step-level failures never appear here; they live in the result.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Planning(#[from] PlanningError),

    #[error("no plan source: auto-planning is disabled and no steps were provided")]
    NoPlanSource,

    #[error("execution cancelled")]
    Cancelled,
}

/// Custom final-output aggregation over the ordered step results.
pub type Aggregator = Arc<dyn Fn(&[StepResult]) -> Option<String> + Send + Sync>;

/// The orchestrator. Owns nothing but references to its collaborators;
/// construct one per wiring and share it freely.
pub struct ToolPipeline<G, T> {
    gateway: Arc<G>,
    executor: Arc<T>,
    telemetry: Arc<dyn TelemetrySink>,
    aggregator: Option<Aggregator>,
    cancellation_token: Option<CancellationToken>,
}

impl<G, T> Clone for ToolPipeline<G, T> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            executor: Arc::clone(&self.executor),
            telemetry: Arc::clone(&self.telemetry),
            aggregator: self.aggregator.clone(),
            cancellation_token: self.cancellation_token.clone(),
        }
    }
}

impl<G, T> ToolPipeline<G, T>
where
    G: ModelGateway + 'static,
    T: ToolExecutorPort + 'static,
{
    pub fn new(gateway: Arc<G>, executor: Arc<T>) -> Self {
        Self {
            gateway,
            executor,
            telemetry: Arc::new(NoTelemetry),
            aggregator: None,
            cancellation_token: None,
        }
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn with_aggregator(mut self, aggregator: Aggregator) -> Self {
        self.aggregator = Some(aggregator);
        self
    }

    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    /// Execute a request end to end.
    ///
    /// Resolution order for the plan: caller-supplied steps win; otherwise
    /// auto-planning runs through the model gateway; otherwise the call is
    /// rejected outright.
    pub async fn execute(
        &self,
        request: &str,
        context: &ExecutionContext,
        options: ExecutionOptions,
    ) -> Result<ExecutionResult, PipelineError> {
        let started = Instant::now();
        let catalog = self.executor.catalog();

        let (plan, mut metadata) = if let Some(steps) = options.provided_steps.clone() {
            let mut metadata = HashMap::new();
            metadata.insert("plan_source".to_string(), serde_json::json!("provided"));
            (Plan::from_steps(steps), metadata)
        } else if options.auto_planning {
            let allowlist = self.executor.allowlist();
            match plan_with_gateway(
                self.gateway.as_ref(),
                request,
                &options.history,
                &catalog,
                allowlist.as_ref(),
            )
            .await
            {
                Ok((plan, response)) => {
                    self.telemetry.record(TelemetryEvent::PlanningCompleted {
                        trace_id: context.trace_id.clone(),
                        model: response.model.clone(),
                        steps: plan.len(),
                        confidence: plan.confidence,
                    });
                    let mut metadata = HashMap::new();
                    metadata.insert("plan_source".to_string(), serde_json::json!("generated"));
                    metadata.insert(
                        "planner_model".to_string(),
                        serde_json::json!(response.model),
                    );
                    metadata.insert("confidence".to_string(), serde_json::json!(plan.confidence));
                    (plan, metadata)
                }
                Err(error) => {
                    self.telemetry.record(TelemetryEvent::PlanningFailed {
                        trace_id: context.trace_id.clone(),
                        error: error.to_string(),
                    });
                    return Err(error.into());
                }
            }
        } else {
            return Err(PipelineError::NoPlanSource);
        };

        metadata.insert(
            "estimated_time_ms".to_string(),
            serde_json::json!(plan.estimated_time_ms),
        );

        self.run_plan(plan, context, &options, &catalog, started, metadata)
            .await
    }

    /// Execute an already-validated plan, keeping its dependency map.
    pub async fn execute_plan(
        &self,
        plan: Plan,
        context: &ExecutionContext,
        options: ExecutionOptions,
    ) -> Result<ExecutionResult, PipelineError> {
        let started = Instant::now();
        let catalog = self.executor.catalog();
        let mut metadata = HashMap::new();
        metadata.insert("plan_source".to_string(), serde_json::json!("provided"));
        self.run_plan(plan, context, &options, &catalog, started, metadata)
            .await
    }

    async fn run_plan(
        &self,
        plan: Plan,
        context: &ExecutionContext,
        options: &ExecutionOptions,
        catalog: &ToolCatalog,
        started: Instant,
        metadata: HashMap<String, serde_json::Value>,
    ) -> Result<ExecutionResult, PipelineError> {
        let trace_id = context.trace_id.clone();
        let step_count = plan.len();
        self.telemetry.record(TelemetryEvent::ExecutionStarted {
            trace_id: trace_id.clone(),
            step_count,
        });

        // The explicitly-valid no-op plan.
        if plan.is_empty() {
            let result = ExecutionResult {
                metadata,
                ..ExecutionResult::empty(elapsed_ms(started))
            };
            self.telemetry.record(TelemetryEvent::ExecutionFinished {
                trace_id,
                success: true,
                total_time_ms: result.total_time_ms,
            });
            return Ok(result);
        }

        let prerequisites = schedule::prerequisites(&plan);
        let deadline =
            tokio::time::Instant::now() + Duration::from_millis(options.timeout_ms.max(1));

        let mut results: Vec<Option<StepResult>> = (0..step_count).map(|_| None).collect();
        let mut succeeded: HashSet<usize> = HashSet::new();
        let mut terminal: HashSet<usize> = HashSet::new();
        let mut dispatched: HashSet<usize> = HashSet::new();
        let mut running: JoinSet<(usize, StepResult)> = JoinSet::new();
        let mut task_index: HashMap<tokio::task::Id, usize> = HashMap::new();
        let mut deadline_hit = false;

        loop {
            // Resolve steps downstream of a failure (fail-fast): the whole
            // dependent closure is settled at once, without running anything.
            if !options.continue_on_error {
                let failed: HashSet<usize> = terminal.difference(&succeeded).copied().collect();
                if !failed.is_empty() {
                    let blocked = schedule::dependents_closure(&prerequisites, &failed);
                    for index in 0..step_count {
                        if !blocked.contains(&index) || dispatched.contains(&index) {
                            continue;
                        }
                        let Some(bad) = prerequisites[index]
                            .iter()
                            .copied()
                            .find(|d| failed.contains(d) || blocked.contains(d))
                        else {
                            continue;
                        };
                        let result = StepResult::failure(
                            plan.steps[index].tool.clone(),
                            StepError::PrerequisiteFailed { index: bad },
                            0,
                        );
                        self.finish_step(&trace_id, index, &result);
                        results[index] = Some(result);
                        dispatched.insert(index);
                        terminal.insert(index);
                    }
                }
            }

            // Dispatch ready steps up to the parallelism cap. With
            // continue_on_error a step only needs its prerequisites to be
            // finished; by default they must have succeeded.
            let satisfied = if options.continue_on_error {
                &terminal
            } else {
                &succeeded
            };
            for index in schedule::ready_steps(&prerequisites, satisfied, &dispatched) {
                if running.len() >= options.max_parallelism {
                    break;
                }
                dispatched.insert(index);
                let step = plan.steps[index].clone();

                if !options.allow_unsafe_tools
                    && catalog
                        .get(&step.tool)
                        .map(|d| d.is_high_risk())
                        .unwrap_or(false)
                {
                    let result = StepResult::failure(
                        step.tool.clone(),
                        StepError::Policy {
                            tool: step.tool.clone(),
                            reason: "high-risk tool refused without allow_unsafe_tools"
                                .to_string(),
                        },
                        0,
                    );
                    self.finish_step(&trace_id, index, &result);
                    results[index] = Some(result);
                    terminal.insert(index);
                    continue;
                }

                self.telemetry.record(TelemetryEvent::StepStarted {
                    trace_id: trace_id.clone(),
                    index,
                    tool: step.tool.clone(),
                });
                debug!(index, tool = %step.tool, "dispatching step");

                let executor = Arc::clone(&self.executor);
                let step_context = context.clone();
                let step_timeout_ms = options.step_timeout_ms;
                let handle = running.spawn(async move {
                    let begin = Instant::now();
                    let outcome = tokio::time::timeout(
                        Duration::from_millis(step_timeout_ms.max(1)),
                        executor.invoke(&step, &step_context),
                    )
                    .await;
                    let latency_ms = elapsed_ms(begin);
                    let result = match outcome {
                        Ok(Ok(output)) => StepResult::success(&step.tool, output, latency_ms),
                        Ok(Err(error)) => StepResult::failure(&step.tool, error, latency_ms),
                        Err(_) => StepResult::failure(
                            &step.tool,
                            StepError::Timeout {
                                timeout_ms: step_timeout_ms,
                            },
                            latency_ms,
                        ),
                    };
                    (index, result)
                });
                task_index.insert(handle.id(), index);
            }

            if running.is_empty() {
                if dispatched.len() == step_count {
                    break;
                }
                // Undispatched steps remain; the next iteration either
                // dispatches them or resolves them as prerequisite failures.
                continue;
            }

            let cancel = self.cancellation_token.clone();
            tokio::select! {
                joined = running.join_next_with_id() => match joined {
                    Some(Ok((id, (index, result)))) => {
                        task_index.remove(&id);
                        self.finish_step(&trace_id, index, &result);
                        if result.is_success() {
                            succeeded.insert(index);
                        }
                        terminal.insert(index);
                        results[index] = Some(result);
                    }
                    Some(Err(join_error)) => {
                        // A panicking handler must not take the pipeline
                        // down; record it as an execution failure.
                        if let Some(index) = task_index.remove(&join_error.id()) {
                            let tool = plan.steps[index].tool.clone();
                            warn!(index, %tool, "step task failed: {join_error}");
                            let result = StepResult::failure(
                                tool.clone(),
                                StepError::Execution {
                                    tool,
                                    message: format!("handler aborted: {join_error}"),
                                },
                                0,
                            );
                            self.finish_step(&trace_id, index, &result);
                            terminal.insert(index);
                            results[index] = Some(result);
                        }
                    }
                    None => {}
                },
                _ = tokio::time::sleep_until(deadline) => {
                    warn!(timeout_ms = options.timeout_ms, "pipeline deadline exceeded, cancelling remaining steps");
                    running.abort_all();
                    deadline_hit = true;
                    break;
                }
                _ = cancelled(cancel) => {
                    running.abort_all();
                    return Err(PipelineError::Cancelled);
                }
            }
        }

        if deadline_hit {
            for (index, slot) in results.iter_mut().enumerate() {
                if slot.is_none() {
                    let result = StepResult::failure(
                        plan.steps[index].tool.clone(),
                        StepError::Timeout {
                            timeout_ms: options.timeout_ms,
                        },
                        0,
                    );
                    self.finish_step(&trace_id, index, &result);
                    *slot = Some(result);
                }
            }
        }

        // Plan-declared order, not completion order.
        let steps: Vec<StepResult> = results
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| {
                    StepResult::failure(
                        plan.steps[index].tool.clone(),
                        StepError::Timeout {
                            timeout_ms: options.timeout_ms,
                        },
                        0,
                    )
                })
            })
            .collect();

        let success = steps.iter().all(|s| s.is_success());
        let final_output = match &self.aggregator {
            Some(aggregate) => aggregate(&steps),
            None => steps
                .iter()
                .rev()
                .find(|s| s.is_success())
                .and_then(|s| s.output.clone()),
        };

        let total_time_ms = elapsed_ms(started);
        self.telemetry.record(TelemetryEvent::ExecutionFinished {
            trace_id,
            success,
            total_time_ms,
        });

        Ok(ExecutionResult {
            steps,
            success,
            final_output,
            total_time_ms,
            metadata,
        })
    }

    fn finish_step(&self, trace_id: &str, index: usize, result: &StepResult) {
        self.telemetry.record(TelemetryEvent::StepFinished {
            trace_id: trace_id.to_string(),
            index,
            tool: result.tool.clone(),
            success: result.is_success(),
            latency_ms: result.latency_ms,
        });
    }
}

async fn cancelled(token: Option<CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}
