//! Telemetry port
//!
//! The pipeline and router report progress as ordered events through a
//! single `record(event)` sink. Adapters decide what to do with them —
//! log them, forward them over a channel, or drop them. The pipeline
//! never couples to a concrete logger.

use relay_domain::routing::breaker::BreakerState;

/// Observability events emitted during execution.
///
/// Events for one execution are recorded in causal order: a step's
/// `StepStarted` always precedes its `StepFinished`.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryEvent {
    /// A pipeline execution began.
    ExecutionStarted {
        trace_id: String,
        step_count: usize,
    },
    /// Auto-planning produced a valid plan.
    PlanningCompleted {
        trace_id: String,
        model: String,
        steps: usize,
        confidence: f64,
    },
    /// Auto-planning failed; the execution aborts.
    PlanningFailed { trace_id: String, error: String },
    /// A step was dispatched to the executive.
    StepStarted {
        trace_id: String,
        index: usize,
        tool: String,
    },
    /// A step finished (success or failure).
    StepFinished {
        trace_id: String,
        index: usize,
        tool: String,
        success: bool,
        latency_ms: u64,
    },
    /// A model's circuit breaker changed state.
    BreakerTransition {
        model: String,
        from: BreakerState,
        to: BreakerState,
    },
    /// A model call failed and the router is falling back.
    ModelAttemptFailed { model: String, error: String },
    /// A completion was served, with usage accounting.
    CompletionServed {
        model: String,
        total_tokens: u32,
        cost: f64,
    },
    /// A pipeline execution finished.
    ExecutionFinished {
        trace_id: String,
        success: bool,
        total_time_ms: u64,
    },
}

/// Sink for telemetry events.
pub trait TelemetrySink: Send + Sync {
    fn record(&self, event: TelemetryEvent);
}

/// Sink that drops everything; the default when callers do not care.
pub struct NoTelemetry;

impl TelemetrySink for NoTelemetry {
    fn record(&self, _event: TelemetryEvent) {}
}
