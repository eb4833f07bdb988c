//! Content search tool: grep_search

use super::handler::{HandlerError, ToolHandler, get_str, get_u64, require_str, resolve_path};
use async_trait::async_trait;
use regex::Regex;
use relay_domain::execution::ExecutionContext;
use relay_domain::tool::entities::{ParamType, RiskLevel, ToolDefinition, ToolParameter};
use std::collections::HashMap;
use std::fs;

/// Tool name constant
pub const GREP_SEARCH: &str = "grep_search";

/// Default cap on reported matches
const DEFAULT_MAX_RESULTS: u64 = 100;

/// Files larger than this are skipped rather than scanned
const MAX_SCAN_SIZE: u64 = 5 * 1024 * 1024;

pub fn grep_search_definition() -> ToolDefinition {
    ToolDefinition::new(
        GREP_SEARCH,
        "Search file contents with a regular expression, reporting 'path:line: text' matches",
        RiskLevel::Low,
    )
    .with_parameter(ToolParameter::new("pattern", "Regular expression to search for", true))
    .with_parameter(
        ToolParameter::new("glob", "Glob of files to scan (default: **/*)", false)
            .with_default("**/*"),
    )
    .with_parameter(
        ToolParameter::new("max_results", "Maximum matches to report (default: 100)", false)
            .with_type(ParamType::Number),
    )
}

pub struct GrepSearchHandler;

#[async_trait]
impl ToolHandler for GrepSearchHandler {
    async fn run(
        &self,
        args: &HashMap<String, serde_json::Value>,
        context: &ExecutionContext,
    ) -> Result<String, HandlerError> {
        let pattern = require_str(args, "pattern")?;
        let regex = Regex::new(pattern)
            .map_err(|e| HandlerError::new(format!("invalid pattern: {}", e)))?;

        let glob_pattern = get_str(args, "glob").unwrap_or("**/*");
        let max_results = get_u64(args, "max_results").unwrap_or(DEFAULT_MAX_RESULTS) as usize;

        let root = resolve_path(context, ".");
        let full_glob = root.join(glob_pattern);
        let paths = glob::glob(&full_glob.to_string_lossy())
            .map_err(|e| HandlerError::new(format!("invalid glob: {}", e)))?;

        let mut matches = Vec::new();
        'scan: for path in paths.flatten() {
            if !path.is_file() {
                continue;
            }
            if fs::metadata(&path).map(|m| m.len() > MAX_SCAN_SIZE).unwrap_or(true) {
                continue;
            }
            // Binary files fail the UTF-8 read and are skipped.
            let Ok(content) = fs::read_to_string(&path) else {
                continue;
            };

            let display = path
                .strip_prefix(&root)
                .unwrap_or(&path)
                .to_string_lossy()
                .into_owned();
            for (line_number, line) in content.lines().enumerate() {
                if regex.is_match(line) {
                    matches.push(format!("{}:{}: {}", display, line_number + 1, line.trim()));
                    if matches.len() >= max_results {
                        matches.push("... (results truncated)".to_string());
                        break 'scan;
                    }
                }
            }
        }

        if matches.is_empty() {
            Ok("no matches".to_string())
        } else {
            Ok(matches.join("\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn args(pairs: &[(&str, serde_json::Value)]) -> HashMap<String, serde_json::Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_grep_finds_matches_with_line_numbers() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "alpha\nneedle here\nomega").unwrap();
        fs::write(dir.path().join("b.txt"), "nothing").unwrap();
        let context = ExecutionContext::new("s", "t").with_working_directory(dir.path());

        let output = GrepSearchHandler
            .run(&args(&[("pattern", serde_json::json!("needle"))]), &context)
            .await
            .unwrap();

        assert!(output.contains("a.txt:2: needle here"));
        assert!(!output.contains("b.txt"));
    }

    #[tokio::test]
    async fn test_grep_no_matches() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "alpha").unwrap();
        let context = ExecutionContext::new("s", "t").with_working_directory(dir.path());

        let output = GrepSearchHandler
            .run(&args(&[("pattern", serde_json::json!("zzz"))]), &context)
            .await
            .unwrap();
        assert_eq!(output, "no matches");
    }

    #[tokio::test]
    async fn test_grep_invalid_pattern() {
        let context = ExecutionContext::new("s", "t");
        let err = GrepSearchHandler
            .run(&args(&[("pattern", serde_json::json!("[unclosed"))]), &context)
            .await
            .unwrap_err();
        assert!(err.message.contains("invalid pattern"));
    }

    #[tokio::test]
    async fn test_grep_respects_max_results() {
        let dir = tempdir().unwrap();
        let body = (0..20).map(|i| format!("hit {}", i)).collect::<Vec<_>>().join("\n");
        fs::write(dir.path().join("a.txt"), body).unwrap();
        let context = ExecutionContext::new("s", "t").with_working_directory(dir.path());

        let output = GrepSearchHandler
            .run(
                &args(&[
                    ("pattern", serde_json::json!("hit")),
                    ("max_results", serde_json::json!(5)),
                ]),
                &context,
            )
            .await
            .unwrap();

        assert_eq!(output.lines().count(), 6); // 5 matches + truncation note
        assert!(output.contains("truncated"));
    }
}
