//! Command execution tool: run_command
//!
//! The only gateway to arbitrary commands in the system. It is reachable
//! exclusively through an explicit, schema-validated plan step — never
//! through any error-recovery path — and is registered high-risk, so the
//! pipeline refuses it unless the caller opted into unsafe tools.

use super::handler::{HandlerError, ToolHandler, get_str, get_u64, require_str};
use async_trait::async_trait;
use relay_domain::execution::ExecutionContext;
use relay_domain::tool::entities::{ParamType, RiskLevel, ToolDefinition, ToolParameter};
use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Tool name constant
pub const RUN_COMMAND: &str = "run_command";

/// Default timeout for command execution (60 seconds)
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Maximum output size (1 MB)
const MAX_OUTPUT_SIZE: usize = 1024 * 1024;

pub fn run_command_definition() -> ToolDefinition {
    ToolDefinition::new(
        RUN_COMMAND,
        "Execute a shell command and return its output. Use with caution.",
        RiskLevel::High,
    )
    .with_parameter(ToolParameter::new("command", "The command to execute", true))
    .with_parameter(ToolParameter::new(
        "working_dir",
        "Working directory for the command",
        false,
    ))
    .with_parameter(
        ToolParameter::new("timeout_secs", "Timeout in seconds (default: 60)", false)
            .with_type(ParamType::Number),
    )
}

pub struct RunCommandHandler;

#[async_trait]
impl ToolHandler for RunCommandHandler {
    async fn run(
        &self,
        args: &HashMap<String, serde_json::Value>,
        context: &ExecutionContext,
    ) -> Result<String, HandlerError> {
        let command_str = require_str(args, "command")?;
        let timeout_secs = get_u64(args, "timeout_secs").unwrap_or(DEFAULT_TIMEOUT_SECS);

        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", command_str]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", command_str]);
            c
        };

        // Explicit working_dir argument wins over the execution context.
        let working_dir = get_str(args, "working_dir")
            .map(std::path::PathBuf::from)
            .or_else(|| context.working_directory.clone());
        if let Some(dir) = working_dir {
            if !dir.is_dir() {
                return Err(HandlerError::new(format!(
                    "working directory does not exist: {}",
                    dir.display()
                )));
            }
            cmd.current_dir(dir);
        }

        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let child = cmd
            .spawn()
            .map_err(|e| HandlerError::new(format!("failed to spawn command: {}", e)))?;

        let output = tokio::time::timeout(
            Duration::from_secs(timeout_secs),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| {
            HandlerError::new(format!("command timed out after {} seconds", timeout_secs))
        })?
        .map_err(|e| HandlerError::new(format!("failed to wait for command: {}", e)))?;

        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        let mut combined = String::new();
        if !stdout.is_empty() {
            combined.push_str(&stdout);
        }
        if !stderr.is_empty() {
            if !combined.is_empty() {
                combined.push_str("\n--- stderr ---\n");
            }
            combined.push_str(&stderr);
        }
        if combined.len() > MAX_OUTPUT_SIZE {
            combined.truncate(MAX_OUTPUT_SIZE);
            combined.push_str("\n... (output truncated)");
        }

        if output.status.success() {
            Ok(combined)
        } else {
            // Non-zero exit is still a tool-level result, not a fault;
            // the planner decides what to do with it.
            Ok(format!("command exited with code {}\n{}", exit_code, combined))
        }
    }
}
