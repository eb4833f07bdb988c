//! Strict plan parsing from planner responses.
//!
//! Converts a raw planner response (untrusted text, expected to be JSON)
//! into a validated [`Plan`]. Parsing is deliberately unforgiving about
//! `steps`: a response without a well-formed steps array is a
//! [`PlanningError`], full stop. Earlier designs recovered from parse
//! failures by wrapping the raw user request into a generic command step;
//! that path allowed arbitrary command execution and must never return.
//! Optional metadata (`reasoning`, `confidence`, `dependencies`,
//! `estimated_time_ms`) still receives documented defaults — defaulting
//! applies to metadata only, never to `steps`.

use super::entities::{DEFAULT_CONFIDENCE, DEFAULT_ESTIMATED_TIME_MS, Plan, Step};
use super::schedule;
use crate::tool::entities::ToolCatalog;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Error raised when a planner response cannot become a valid plan.
///
/// Fatal for the current execution: the pipeline aborts rather than
/// degrading into direct command execution.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanningError {
    #[error("planner response is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("planner response has no 'steps' array")]
    MissingSteps,

    #[error("step {index} is not an object with a 'tool' name")]
    MalformedStep { index: usize },

    #[error("step {index} references unknown tool '{tool}'")]
    UnknownTool { index: usize, tool: String },

    #[error("step {index} references tool '{tool}' outside the allowlist")]
    DisallowedTool { index: usize, tool: String },

    #[error("dependency entry for step {index} is invalid: {detail}")]
    InvalidDependency { index: usize, detail: String },

    #[error("plan dependencies contain a cycle involving step {index}")]
    CyclicDependency { index: usize },

    #[error("planner unavailable: {0}")]
    PlannerUnavailable(String),
}

/// Parse a raw planner response into a validated [`Plan`].
///
/// Accepts either a bare JSON object or one wrapped in a ```json fenced
/// block (some providers insist on markdown). Every step's tool must exist
/// in `catalog` and, when an allowlist is given, be a member of it.
/// An empty `steps` array parses successfully into a no-op plan.
pub fn parse_plan(
    raw: &str,
    catalog: &ToolCatalog,
    allowlist: Option<&HashSet<String>>,
) -> Result<Plan, PlanningError> {
    let value = extract_json(raw)?;
    parse_plan_value(&value, catalog, allowlist)
}

/// Parse an already-decoded JSON value into a validated [`Plan`].
pub fn parse_plan_value(
    value: &serde_json::Value,
    catalog: &ToolCatalog,
    allowlist: Option<&HashSet<String>>,
) -> Result<Plan, PlanningError> {
    let steps_value = value
        .get("steps")
        .and_then(|v| v.as_array())
        .ok_or(PlanningError::MissingSteps)?;

    let mut steps = Vec::with_capacity(steps_value.len());
    for (index, step_json) in steps_value.iter().enumerate() {
        let tool = step_json
            .get("tool")
            .and_then(|v| v.as_str())
            .filter(|t| !t.is_empty())
            .ok_or(PlanningError::MalformedStep { index })?;

        if !catalog.contains(tool) {
            return Err(PlanningError::UnknownTool {
                index,
                tool: tool.to_string(),
            });
        }
        if let Some(allowed) = allowlist
            && !allowed.contains(tool)
        {
            return Err(PlanningError::DisallowedTool {
                index,
                tool: tool.to_string(),
            });
        }

        let args = step_json
            .get("args")
            .and_then(|v| v.as_object())
            .map(|obj| obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();

        steps.push(Step {
            tool: tool.to_string(),
            args,
        });
    }

    let dependencies = parse_dependencies(value.get("dependencies"), steps.len())?;

    // Reject cycles up front so the scheduler never deadlocks on a bad plan.
    let normalized = schedule::normalize(&dependencies, steps.len());
    if let Err(index) = schedule::check_acyclic(&normalized) {
        return Err(PlanningError::CyclicDependency { index });
    }

    // Optional metadata: documented defaults, lenient about wrong types.
    let reasoning = value
        .get("reasoning")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    let confidence = value
        .get("confidence")
        .and_then(|v| v.as_f64())
        .unwrap_or(DEFAULT_CONFIDENCE)
        .clamp(0.0, 1.0);
    let estimated_time_ms = value
        .get("estimated_time_ms")
        .and_then(|v| v.as_u64())
        .unwrap_or(DEFAULT_ESTIMATED_TIME_MS);

    Ok(Plan {
        steps,
        reasoning,
        confidence,
        dependencies,
        estimated_time_ms,
    })
}

/// Decode the response as JSON, unwrapping a single fenced code block if
/// the whole string is not itself valid JSON.
fn extract_json(raw: &str) -> Result<serde_json::Value, PlanningError> {
    let trimmed = raw.trim();
    match serde_json::from_str(trimmed) {
        Ok(value) => Ok(value),
        Err(first_err) => {
            if let Some(block) = fenced_block(trimmed) {
                serde_json::from_str(block)
                    .map_err(|e| PlanningError::InvalidJson(e.to_string()))
            } else {
                Err(PlanningError::InvalidJson(first_err.to_string()))
            }
        }
    }
}

/// Find the body of the first ``` fenced block, tolerating a language tag.
fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_fence = &text[open + 3..];
    let body_start = after_fence.find('\n')? + 1;
    let body = &after_fence[body_start..];
    let close = body.find("```")?;
    Some(&body[..close])
}

fn parse_dependencies(
    value: Option<&serde_json::Value>,
    step_count: usize,
) -> Result<HashMap<usize, Vec<usize>>, PlanningError> {
    let Some(value) = value else {
        return Ok(HashMap::new());
    };
    // Absent or null dependencies default to none; anything else must be
    // a well-formed index map, since ordering correctness depends on it.
    if value.is_null() {
        return Ok(HashMap::new());
    }
    let object = value
        .as_object()
        .ok_or_else(|| PlanningError::InvalidDependency {
            index: 0,
            detail: "'dependencies' is not an object".to_string(),
        })?;

    let mut dependencies = HashMap::with_capacity(object.len());
    for (key, deps_value) in object {
        let index: usize = key
            .parse()
            .map_err(|_| PlanningError::InvalidDependency {
                index: 0,
                detail: format!("'{}' is not a step index", key),
            })?;
        if index >= step_count {
            return Err(PlanningError::InvalidDependency {
                index,
                detail: format!("step {} does not exist", index),
            });
        }

        let deps_array = deps_value
            .as_array()
            .ok_or_else(|| PlanningError::InvalidDependency {
                index,
                detail: "prerequisite list is not an array".to_string(),
            })?;

        let mut prerequisites = Vec::with_capacity(deps_array.len());
        for dep in deps_array {
            let dep_index = dep
                .as_u64()
                .map(|d| d as usize)
                .ok_or_else(|| PlanningError::InvalidDependency {
                    index,
                    detail: format!("prerequisite '{}' is not an index", dep),
                })?;
            if dep_index >= step_count {
                return Err(PlanningError::InvalidDependency {
                    index,
                    detail: format!("prerequisite step {} does not exist", dep_index),
                });
            }
            prerequisites.push(dep_index);
        }
        dependencies.insert(index, prerequisites);
    }

    Ok(dependencies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::entities::{RiskLevel, ToolDefinition};

    fn catalog() -> ToolCatalog {
        let mut catalog = ToolCatalog::new();
        for name in ["read_file", "write_file", "list_directory", "run_command"] {
            catalog
                .insert(ToolDefinition::new(name, name, RiskLevel::Low))
                .unwrap();
        }
        catalog
    }

    #[test]
    fn test_parse_minimal_plan() {
        let raw = r#"{"steps":[{"tool":"list_directory","args":{"path":"."}}]}"#;
        let plan = parse_plan(raw, &catalog(), None).unwrap();

        assert_eq!(plan.len(), 1);
        assert_eq!(plan.steps[0].tool, "list_directory");
        assert_eq!(plan.steps[0].args["path"], serde_json::json!("."));
        assert_eq!(plan.confidence, DEFAULT_CONFIDENCE);
        assert_eq!(plan.estimated_time_ms, DEFAULT_ESTIMATED_TIME_MS);
        assert!(plan.dependencies.is_empty());
    }

    #[test]
    fn test_parse_full_metadata() {
        let raw = r#"{
            "steps": [
                {"tool": "read_file", "args": {"path": "a.txt"}},
                {"tool": "write_file", "args": {"path": "b.txt", "content": "x"}}
            ],
            "reasoning": "copy the file",
            "confidence": 0.9,
            "dependencies": {"1": [0]},
            "estimated_time_ms": 5000
        }"#;
        let plan = parse_plan(raw, &catalog(), None).unwrap();

        assert_eq!(plan.reasoning, "copy the file");
        assert_eq!(plan.confidence, 0.9);
        assert_eq!(plan.prerequisites_of(1), &[0]);
        assert_eq!(plan.estimated_time_ms, 5000);
    }

    #[test]
    fn test_not_json_is_error() {
        let err = parse_plan("not json", &catalog(), None).unwrap_err();
        assert!(matches!(err, PlanningError::InvalidJson(_)));
    }

    #[test]
    fn test_missing_steps_is_error() {
        let err = parse_plan(r#"{"reasoning":"hmm"}"#, &catalog(), None).unwrap_err();
        assert_eq!(err, PlanningError::MissingSteps);
    }

    #[test]
    fn test_steps_not_array_is_error() {
        let err = parse_plan(r#"{"steps":"read the file"}"#, &catalog(), None).unwrap_err();
        assert_eq!(err, PlanningError::MissingSteps);
    }

    #[test]
    fn test_empty_steps_is_valid_noop() {
        let plan = parse_plan(r#"{"steps":[]}"#, &catalog(), None).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_unknown_tool_is_error_not_fallback() {
        let raw = r#"{"steps":[{"tool":"rm_rf_everything","args":{}}]}"#;
        let err = parse_plan(raw, &catalog(), None).unwrap_err();
        assert_eq!(
            err,
            PlanningError::UnknownTool {
                index: 0,
                tool: "rm_rf_everything".to_string()
            }
        );
    }

    #[test]
    fn test_allowlist_enforced_at_parse_time() {
        let allowed: HashSet<String> = ["read_file".to_string()].into();
        let raw = r#"{"steps":[{"tool":"run_command","args":{"command":"ls"}}]}"#;
        let err = parse_plan(raw, &catalog(), Some(&allowed)).unwrap_err();
        assert!(matches!(err, PlanningError::DisallowedTool { index: 0, .. }));
    }

    #[test]
    fn test_step_without_tool_is_error() {
        let raw = r#"{"steps":[{"args":{"path":"a.txt"}}]}"#;
        let err = parse_plan(raw, &catalog(), None).unwrap_err();
        assert_eq!(err, PlanningError::MalformedStep { index: 0 });
    }

    #[test]
    fn test_dependency_out_of_range() {
        let raw = r#"{"steps":[{"tool":"read_file","args":{"path":"a"}}],"dependencies":{"0":[7]}}"#;
        let err = parse_plan(raw, &catalog(), None).unwrap_err();
        assert!(matches!(err, PlanningError::InvalidDependency { .. }));
    }

    #[test]
    fn test_dependency_cycle() {
        let raw = r#"{
            "steps": [
                {"tool": "read_file", "args": {"path": "a"}},
                {"tool": "read_file", "args": {"path": "b"}}
            ],
            "dependencies": {"0": [1], "1": [0]}
        }"#;
        let err = parse_plan(raw, &catalog(), None).unwrap_err();
        assert!(matches!(err, PlanningError::CyclicDependency { .. }));
    }

    #[test]
    fn test_self_dependency_is_cycle() {
        let raw =
            r#"{"steps":[{"tool":"read_file","args":{"path":"a"}}],"dependencies":{"0":[0]}}"#;
        let err = parse_plan(raw, &catalog(), None).unwrap_err();
        assert_eq!(err, PlanningError::CyclicDependency { index: 0 });
    }

    #[test]
    fn test_fenced_json_block() {
        let raw = "Here is the plan:\n```json\n{\"steps\":[{\"tool\":\"read_file\",\"args\":{\"path\":\"a.txt\"}}]}\n```\nDone.";
        let plan = parse_plan(raw, &catalog(), None).unwrap();
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn test_confidence_clamped() {
        let raw = r#"{"steps":[],"confidence":7.5}"#;
        let plan = parse_plan(raw, &catalog(), None).unwrap();
        assert_eq!(plan.confidence, 1.0);
    }

    #[test]
    fn test_wrong_typed_metadata_falls_back_to_defaults() {
        let raw = r#"{"steps":[],"reasoning":42,"confidence":"high","estimated_time_ms":"soon"}"#;
        let plan = parse_plan(raw, &catalog(), None).unwrap();
        assert_eq!(plan.reasoning, "");
        assert_eq!(plan.confidence, DEFAULT_CONFIDENCE);
        assert_eq!(plan.estimated_time_ms, DEFAULT_ESTIMATED_TIME_MS);
    }
}
