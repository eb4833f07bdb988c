//! Tool domain value objects — immutable step outcomes and typed errors.
//!
//! Every step execution produces a [`StepResult`]. Failures carry a
//! [`StepError`] variant rather than a bare string so callers can tell a
//! policy refusal from a handler fault from a timeout.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error that terminated a single step.
///
/// Step-level errors are captured into [`StepResult::error`] and never
/// crash the pipeline; the pipeline decides scheduling policy from the
/// variant.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepError {
    /// The requested tool is not registered.
    #[error("tool not found: {tool}")]
    ToolNotFound { tool: String },

    /// The tool exists but the execution policy refuses it.
    #[error("tool '{tool}' is not permitted: {reason}")]
    Policy { tool: String, reason: String },

    /// The arguments do not conform to the tool's parameter schema.
    #[error("invalid arguments for '{tool}': {message}")]
    Validation { tool: String, message: String },

    /// The handler ran and failed; the original message is preserved.
    #[error("tool '{tool}' failed: {message}")]
    Execution { tool: String, message: String },

    /// The step (or the whole pipeline) exceeded its deadline.
    #[error("step timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    /// A prerequisite step failed, so this step was never started.
    #[error("prerequisite step {index} did not succeed")]
    PrerequisiteFailed { index: usize },
}

impl StepError {
    /// Short machine-readable tag, used in telemetry and serialized output.
    pub fn kind(&self) -> &'static str {
        match self {
            StepError::ToolNotFound { .. } => "tool_not_found",
            StepError::Policy { .. } => "policy",
            StepError::Validation { .. } => "validation",
            StepError::Execution { .. } => "execution",
            StepError::Timeout { .. } => "timeout",
            StepError::PrerequisiteFailed { .. } => "prerequisite_failed",
        }
    }
}

/// Immutable outcome of one executed (or refused) step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    /// Name of the tool the step addressed
    pub tool: String,
    /// Whether the step succeeded
    pub success: bool,
    /// Output content (for successful execution)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Error information (for failed execution)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<StepError>,
    /// Wall-clock time spent on the step in milliseconds
    pub latency_ms: u64,
}

impl StepResult {
    /// Create a successful result
    pub fn success(tool: impl Into<String>, output: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            tool: tool.into(),
            success: true,
            output: Some(output.into()),
            error: None,
            latency_ms,
        }
    }

    /// Create a failed result
    pub fn failure(tool: impl Into<String>, error: StepError, latency_ms: u64) -> Self {
        Self {
            tool: tool.into(),
            success: false,
            output: None,
            error: Some(error),
            latency_ms,
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    pub fn error(&self) -> Option<&StepError> {
        self.error.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_result_success() {
        let result = StepResult::success("read_file", "file contents", 12);

        assert!(result.is_success());
        assert_eq!(result.output(), Some("file contents"));
        assert!(result.error().is_none());
        assert_eq!(result.latency_ms, 12);
    }

    #[test]
    fn test_step_result_failure() {
        let result = StepResult::failure(
            "write_file",
            StepError::Policy {
                tool: "write_file".to_string(),
                reason: "not in allowlist".to_string(),
            },
            0,
        );

        assert!(!result.is_success());
        assert!(result.output().is_none());
        assert_eq!(result.error().unwrap().kind(), "policy");
    }

    #[test]
    fn test_step_error_display_preserves_message() {
        let err = StepError::Execution {
            tool: "run_command".to_string(),
            message: "exit status 127".to_string(),
        };
        assert!(err.to_string().contains("exit status 127"));
    }

    #[test]
    fn test_step_error_serializes_with_kind_tag() {
        let err = StepError::Timeout { timeout_ms: 30_000 };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "timeout");
        assert_eq!(json["timeout_ms"], 30_000);
    }
}
