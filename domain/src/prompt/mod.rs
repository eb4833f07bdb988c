//! Prompt templates for the planning call.

use crate::tool::entities::ToolCatalog;
use serde::{Deserialize, Serialize};

/// Who spoke a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One prior conversation turn carried into the planning prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Templates for the planning request sent to the model router.
pub struct PlanningPrompt;

impl PlanningPrompt {
    /// System prompt establishing the strict JSON contract.
    pub fn system() -> &'static str {
        r#"You are a planning assistant that turns a user request into tool invocations.
Respond with a single JSON object and nothing else. Schema:

{
  "steps": [ { "tool": "<tool name>", "args": { "<param>": <value> } } ],
  "reasoning": "why this plan",
  "confidence": 0.0-1.0,
  "dependencies": { "<step index>": [<prerequisite indices>] },
  "estimated_time_ms": <integer>
}

Rules:
- Only use tools from the provided list, with their declared parameters.
- "steps" may be an empty array when the request needs no tool at all.
- Step indices are zero-based; dependencies must not form cycles.
- Never invent tools and never wrap the JSON in prose."#
    }

    /// User prompt for one planning call.
    pub fn planning(request: &str, catalog: &ToolCatalog, history: &[Turn]) -> String {
        let mut prompt = String::from("Available tools:\n");

        let mut tools: Vec<_> = catalog.all().collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        for tool in tools {
            prompt.push_str(&format!("- {}: {}\n", tool.name, tool.description));
            for param in &tool.parameters {
                prompt.push_str(&format!(
                    "    {} ({}{}) - {}\n",
                    param.name,
                    param.param_type,
                    if param.required { ", required" } else { "" },
                    param.description
                ));
            }
        }

        if !history.is_empty() {
            prompt.push_str("\nConversation so far:\n");
            for turn in history {
                prompt.push_str(&format!("[{}] {}\n", turn.role.as_str(), turn.content));
            }
        }

        prompt.push_str(&format!("\nRequest: {}\n\nRespond with the plan JSON.", request));
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::entities::{RiskLevel, ToolDefinition, ToolParameter};

    #[test]
    fn test_planning_prompt_lists_tools_and_params() {
        let mut catalog = ToolCatalog::new();
        catalog
            .insert(
                ToolDefinition::new("read_file", "Read a file", RiskLevel::Low)
                    .with_parameter(ToolParameter::new("path", "File path", true)),
            )
            .unwrap();

        let prompt = PlanningPrompt::planning("show me the readme", &catalog, &[]);

        assert!(prompt.contains("read_file: Read a file"));
        assert!(prompt.contains("path (string, required)"));
        assert!(prompt.contains("Request: show me the readme"));
    }

    #[test]
    fn test_planning_prompt_includes_history() {
        let catalog = ToolCatalog::new();
        let history = vec![
            Turn::user("list the repo"),
            Turn::assistant("done, 14 files"),
        ];

        let prompt = PlanningPrompt::planning("now read Cargo.toml", &catalog, &history);
        assert!(prompt.contains("[user] list the repo"));
        assert!(prompt.contains("[assistant] done, 14 files"));
    }

    #[test]
    fn test_system_prompt_demands_bare_json() {
        assert!(PlanningPrompt::system().contains("single JSON object"));
    }
}
