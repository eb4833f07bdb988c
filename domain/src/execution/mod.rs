//! Execution value objects: context, options, aggregated results.

use crate::plan::entities::Step;
use crate::tool::value_objects::StepResult;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

/// Opaque identifier for one queued execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionId(String);

impl ExecutionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Read-only context threaded through a whole pipeline execution.
///
/// Steps receive a shared reference and never mutate it; each step's own
/// arguments are the only per-step input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Owning conversation/session
    pub session_id: String,
    /// Correlation id for telemetry
    pub trace_id: String,
    /// Base directory for tools that resolve relative paths
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,
    /// Capability tags constraining what this execution may do
    #[serde(default)]
    pub constraints: BTreeSet<String>,
    /// Free-form caller metadata
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ExecutionContext {
    pub fn new(session_id: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            trace_id: trace_id.into(),
            working_directory: None,
            constraints: BTreeSet::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    pub fn with_constraint(mut self, tag: impl Into<String>) -> Self {
        self.constraints.insert(tag.into());
        self
    }

    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn has_constraint(&self, tag: &str) -> bool {
        self.constraints.contains(tag)
    }
}

/// Per-call knobs for the pipeline.
#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    /// Plan via the model router when no steps are provided
    pub auto_planning: bool,
    /// Caller-supplied steps, bypassing the planner
    pub provided_steps: Option<Vec<Step>>,
    /// Admit high-risk tools (off by default)
    pub allow_unsafe_tools: bool,
    /// Concurrency cap for independent steps
    pub max_parallelism: usize,
    /// Whole-pipeline deadline in milliseconds
    pub timeout_ms: u64,
    /// Per-step deadline in milliseconds
    pub step_timeout_ms: u64,
    /// Run every step regardless of earlier failures
    pub continue_on_error: bool,
    /// Prior conversation turns fed into the planning prompt
    pub history: Vec<crate::prompt::Turn>,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            auto_planning: true,
            provided_steps: None,
            allow_unsafe_tools: false,
            max_parallelism: 4,
            timeout_ms: 120_000,
            step_timeout_ms: 30_000,
            continue_on_error: false,
            history: Vec::new(),
        }
    }
}

impl ExecutionOptions {
    pub fn with_provided_steps(mut self, steps: Vec<Step>) -> Self {
        self.provided_steps = Some(steps);
        self
    }

    pub fn with_max_parallelism(mut self, max_parallelism: usize) -> Self {
        self.max_parallelism = max_parallelism.max(1);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_step_timeout_ms(mut self, step_timeout_ms: u64) -> Self {
        self.step_timeout_ms = step_timeout_ms;
        self
    }

    pub fn with_continue_on_error(mut self) -> Self {
        self.continue_on_error = true;
        self
    }

    pub fn with_unsafe_tools(mut self) -> Self {
        self.allow_unsafe_tools = true;
        self
    }
}

/// Aggregated outcome of one pipeline execution.
///
/// `steps` preserves plan-declared order regardless of completion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Per-step outcomes in plan order
    pub steps: Vec<StepResult>,
    /// True only when every step succeeded
    pub success: bool,
    /// Derived from the last successful step unless an aggregator is installed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_output: Option<String>,
    /// Wall-clock duration of the whole execution
    pub total_time_ms: u64,
    /// Execution metadata (plan source, confidence, model, ...)
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ExecutionResult {
    /// The no-op result for an empty plan.
    pub fn empty(total_time_ms: u64) -> Self {
        Self {
            steps: Vec::new(),
            success: true,
            final_output: None,
            total_time_ms,
            metadata: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_builder() {
        let context = ExecutionContext::new("session-1", "trace-1")
            .with_working_directory("/tmp")
            .with_constraint("read_only")
            .with_metadata("origin", "test");

        assert_eq!(context.session_id, "session-1");
        assert!(context.has_constraint("read_only"));
        assert!(!context.has_constraint("network"));
        assert_eq!(context.metadata["origin"], serde_json::json!("test"));
    }

    #[test]
    fn test_options_defaults() {
        let options = ExecutionOptions::default();
        assert!(options.auto_planning);
        assert!(!options.allow_unsafe_tools);
        assert!(!options.continue_on_error);
        assert_eq!(options.max_parallelism, 4);
        assert_eq!(options.step_timeout_ms, 30_000);
    }

    #[test]
    fn test_parallelism_floor_is_one() {
        let options = ExecutionOptions::default().with_max_parallelism(0);
        assert_eq!(options.max_parallelism, 1);
    }

    #[test]
    fn test_empty_result_is_success() {
        let result = ExecutionResult::empty(3);
        assert!(result.success);
        assert!(result.steps.is_empty());
        assert!(result.final_output.is_none());
    }
}
