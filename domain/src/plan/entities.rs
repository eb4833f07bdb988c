//! Plan domain entities

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default assumed runtime when the planner omits `estimated_time_ms`.
pub const DEFAULT_ESTIMATED_TIME_MS: u64 = 30_000;

/// Default confidence when the planner omits it.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// One tool invocation with concrete arguments within a [`Plan`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Name of the tool to invoke
    pub tool: String,
    /// Arguments, validated against the tool's parameter schema before execution
    #[serde(default)]
    pub args: HashMap<String, serde_json::Value>,
}

impl Step {
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            args: HashMap::new(),
        }
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }
}

/// A validated, ordered set of tool-call steps.
///
/// Value object: produced once per planning call and never mutated.
/// A plan with zero steps is valid and means "do nothing" — it is never
/// a disguised fallback for a failed planning attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Ordered steps; result ordering always follows this declaration order
    pub steps: Vec<Step>,
    /// Planner's free-text rationale (informational only)
    pub reasoning: String,
    /// Planner confidence in [0, 1]
    pub confidence: f64,
    /// Step index → indices of prerequisite steps
    #[serde(default)]
    pub dependencies: HashMap<usize, Vec<usize>>,
    /// Planner's runtime estimate in milliseconds
    pub estimated_time_ms: u64,
}

impl Plan {
    /// Build a plan directly from caller-supplied steps.
    ///
    /// No dependencies are assumed, so every step is independently
    /// schedulable; callers wanting strict sequencing cap parallelism at 1.
    pub fn from_steps(steps: Vec<Step>) -> Self {
        Self {
            steps,
            reasoning: String::new(),
            confidence: DEFAULT_CONFIDENCE,
            dependencies: HashMap::new(),
            estimated_time_ms: DEFAULT_ESTIMATED_TIME_MS,
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Prerequisites declared for a step (empty slice when none).
    pub fn prerequisites_of(&self, index: usize) -> &[usize] {
        self.dependencies
            .get(&index)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_steps_defaults() {
        let plan = Plan::from_steps(vec![Step::new("read_file").with_arg("path", "a.txt")]);

        assert_eq!(plan.len(), 1);
        assert_eq!(plan.reasoning, "");
        assert_eq!(plan.confidence, DEFAULT_CONFIDENCE);
        assert!(plan.dependencies.is_empty());
        assert_eq!(plan.estimated_time_ms, DEFAULT_ESTIMATED_TIME_MS);
    }

    #[test]
    fn test_empty_plan_is_valid() {
        let plan = Plan::from_steps(Vec::new());
        assert!(plan.is_empty());
        assert_eq!(plan.len(), 0);
    }

    #[test]
    fn test_prerequisites_of() {
        let mut plan = Plan::from_steps(vec![Step::new("a"), Step::new("b")]);
        plan.dependencies.insert(1, vec![0]);

        assert_eq!(plan.prerequisites_of(1), &[0]);
        assert!(plan.prerequisites_of(0).is_empty());
    }
}
