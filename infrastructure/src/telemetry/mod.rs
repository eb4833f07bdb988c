//! Telemetry sinks: tracing logs, ordered channel, JSONL file.

use relay_application::ports::telemetry::{TelemetryEvent, TelemetrySink};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Sink that renders events through `tracing`.
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn record(&self, event: TelemetryEvent) {
        match event {
            TelemetryEvent::ExecutionStarted {
                trace_id,
                step_count,
            } => info!(%trace_id, step_count, "execution started"),
            TelemetryEvent::PlanningCompleted {
                trace_id,
                model,
                steps,
                confidence,
            } => info!(%trace_id, %model, steps, confidence, "planning completed"),
            TelemetryEvent::PlanningFailed { trace_id, error } => {
                warn!(%trace_id, %error, "planning failed")
            }
            TelemetryEvent::StepStarted {
                trace_id,
                index,
                tool,
            } => debug!(%trace_id, index, %tool, "step started"),
            TelemetryEvent::StepFinished {
                trace_id,
                index,
                tool,
                success,
                latency_ms,
            } => debug!(%trace_id, index, %tool, success, latency_ms, "step finished"),
            TelemetryEvent::BreakerTransition { model, from, to } => {
                info!(%model, %from, %to, "circuit breaker transition")
            }
            TelemetryEvent::ModelAttemptFailed { model, error } => {
                warn!(%model, %error, "model attempt failed")
            }
            TelemetryEvent::CompletionServed {
                model,
                total_tokens,
                cost,
            } => debug!(%model, total_tokens, cost, "completion served"),
            TelemetryEvent::ExecutionFinished {
                trace_id,
                success,
                total_time_ms,
            } => info!(%trace_id, success, total_time_ms, "execution finished"),
        }
    }
}

/// Sink that forwards events over an unbounded channel, preserving the
/// order they were recorded in. The receiving half belongs to whoever
/// consumes the stream (a UI, a collector, a test).
pub struct ChannelTelemetry {
    sender: mpsc::UnboundedSender<TelemetryEvent>,
}

impl ChannelTelemetry {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TelemetryEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl TelemetrySink for ChannelTelemetry {
    fn record(&self, event: TelemetryEvent) {
        // A dropped receiver just means nobody is listening anymore.
        let _ = self.sender.send(event);
    }
}

/// Sink appending one JSON object per event to a file.
pub struct JsonlTelemetry {
    file: Mutex<File>,
}

impl JsonlTelemetry {
    pub fn create(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    fn render(event: &TelemetryEvent) -> serde_json::Value {
        let (kind, fields) = match event {
            TelemetryEvent::ExecutionStarted {
                trace_id,
                step_count,
            } => (
                "execution_started",
                serde_json::json!({"trace_id": trace_id, "step_count": step_count}),
            ),
            TelemetryEvent::PlanningCompleted {
                trace_id,
                model,
                steps,
                confidence,
            } => (
                "planning_completed",
                serde_json::json!({
                    "trace_id": trace_id, "model": model,
                    "steps": steps, "confidence": confidence
                }),
            ),
            TelemetryEvent::PlanningFailed { trace_id, error } => (
                "planning_failed",
                serde_json::json!({"trace_id": trace_id, "error": error}),
            ),
            TelemetryEvent::StepStarted {
                trace_id,
                index,
                tool,
            } => (
                "step_started",
                serde_json::json!({"trace_id": trace_id, "index": index, "tool": tool}),
            ),
            TelemetryEvent::StepFinished {
                trace_id,
                index,
                tool,
                success,
                latency_ms,
            } => (
                "step_finished",
                serde_json::json!({
                    "trace_id": trace_id, "index": index, "tool": tool,
                    "success": success, "latency_ms": latency_ms
                }),
            ),
            TelemetryEvent::BreakerTransition { model, from, to } => (
                "breaker_transition",
                serde_json::json!({
                    "model": model, "from": from.as_str(), "to": to.as_str()
                }),
            ),
            TelemetryEvent::ModelAttemptFailed { model, error } => (
                "model_attempt_failed",
                serde_json::json!({"model": model, "error": error}),
            ),
            TelemetryEvent::CompletionServed {
                model,
                total_tokens,
                cost,
            } => (
                "completion_served",
                serde_json::json!({"model": model, "total_tokens": total_tokens, "cost": cost}),
            ),
            TelemetryEvent::ExecutionFinished {
                trace_id,
                success,
                total_time_ms,
            } => (
                "execution_finished",
                serde_json::json!({
                    "trace_id": trace_id, "success": success, "total_time_ms": total_time_ms
                }),
            ),
        };

        serde_json::json!({
            "at": chrono::Utc::now().to_rfc3339(),
            "event": kind,
            "fields": fields,
        })
    }
}

impl TelemetrySink for JsonlTelemetry {
    fn record(&self, event: TelemetryEvent) {
        let line = Self::render(&event);
        let mut file = self.file.lock().expect("telemetry file lock poisoned");
        // Telemetry must never take the pipeline down with it.
        if let Err(error) = writeln!(file, "{}", line) {
            warn!(%error, "failed to append telemetry event");
        }
    }
}
