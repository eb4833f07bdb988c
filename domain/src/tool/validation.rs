//! Argument validation against a tool's parameter schema.
//!
//! Runs at the executive boundary, before any handler is invoked:
//! required-field check, type check, unknown-argument policy, and
//! default filling for absent optional parameters.

use super::entities::ToolDefinition;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What to do with arguments that are not declared by the tool schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownArgPolicy {
    /// Reject the call with a validation error (default).
    #[default]
    Reject,
    /// Drop the declared-schema check and hand the argument through as-is.
    Passthrough,
}

/// Validate `args` against `definition` and produce the effective argument
/// map the handler will receive (defaults filled in).
///
/// Returns a human-readable message on the first violation found; the
/// caller wraps it into a typed validation error.
pub fn validate_args(
    definition: &ToolDefinition,
    args: &HashMap<String, serde_json::Value>,
    unknown_args: UnknownArgPolicy,
) -> Result<HashMap<String, serde_json::Value>, String> {
    let mut effective = HashMap::with_capacity(args.len());

    for param in &definition.parameters {
        match args.get(&param.name) {
            Some(value) => {
                if !param.param_type.matches(value) {
                    return Err(format!(
                        "parameter '{}' of tool '{}' expects {}, got {}",
                        param.name,
                        definition.name,
                        param.param_type,
                        json_type_name(value)
                    ));
                }
                effective.insert(param.name.clone(), value.clone());
            }
            None if param.required => {
                return Err(format!(
                    "missing required parameter '{}' for tool '{}'",
                    param.name, definition.name
                ));
            }
            None => {
                if let Some(default) = &param.default {
                    effective.insert(param.name.clone(), default.clone());
                }
            }
        }
    }

    let declared: std::collections::HashSet<&str> = definition
        .parameters
        .iter()
        .map(|p| p.name.as_str())
        .collect();

    for (name, value) in args {
        if !declared.contains(name.as_str()) {
            match unknown_args {
                UnknownArgPolicy::Reject => {
                    return Err(format!(
                        "unknown parameter '{}' for tool '{}'",
                        name, definition.name
                    ));
                }
                UnknownArgPolicy::Passthrough => {
                    effective.insert(name.clone(), value.clone());
                }
            }
        }
    }

    Ok(effective)
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::entities::{ParamType, RiskLevel, ToolParameter};

    fn definition() -> ToolDefinition {
        ToolDefinition::new("read_file", "Read file", RiskLevel::Low)
            .with_parameter(ToolParameter::new("path", "File path", true))
            .with_parameter(
                ToolParameter::new("limit", "Max lines", false)
                    .with_type(ParamType::Number)
                    .with_default(200),
            )
    }

    fn args(pairs: &[(&str, serde_json::Value)]) -> HashMap<String, serde_json::Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_missing_required() {
        let err = validate_args(&definition(), &args(&[]), UnknownArgPolicy::Reject).unwrap_err();
        assert!(err.contains("missing required parameter 'path'"));
    }

    #[test]
    fn test_type_mismatch() {
        let err = validate_args(
            &definition(),
            &args(&[("path", serde_json::json!(42))]),
            UnknownArgPolicy::Reject,
        )
        .unwrap_err();
        assert!(err.contains("expects string, got number"));
    }

    #[test]
    fn test_unknown_arg_rejected() {
        let err = validate_args(
            &definition(),
            &args(&[
                ("path", serde_json::json!("a.txt")),
                ("mode", serde_json::json!("fast")),
            ]),
            UnknownArgPolicy::Reject,
        )
        .unwrap_err();
        assert!(err.contains("unknown parameter 'mode'"));
    }

    #[test]
    fn test_unknown_arg_passthrough() {
        let effective = validate_args(
            &definition(),
            &args(&[
                ("path", serde_json::json!("a.txt")),
                ("mode", serde_json::json!("fast")),
            ]),
            UnknownArgPolicy::Passthrough,
        )
        .unwrap();
        assert_eq!(effective["mode"], serde_json::json!("fast"));
    }

    #[test]
    fn test_default_filled_for_absent_optional() {
        let effective = validate_args(
            &definition(),
            &args(&[("path", serde_json::json!("a.txt"))]),
            UnknownArgPolicy::Reject,
        )
        .unwrap();
        assert_eq!(effective["limit"], serde_json::json!(200));
    }

    #[test]
    fn test_explicit_value_overrides_default() {
        let effective = validate_args(
            &definition(),
            &args(&[
                ("path", serde_json::json!("a.txt")),
                ("limit", serde_json::json!(50)),
            ]),
            UnknownArgPolicy::Reject,
        )
        .unwrap();
        assert_eq!(effective["limit"], serde_json::json!(50));
    }
}
