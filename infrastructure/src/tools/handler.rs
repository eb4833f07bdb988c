//! The handler capability behind a registered tool.
//!
//! A handler is registered once at startup next to its definition and
//! invoked by the executive with already-validated arguments. Handlers
//! report failures as values; the executive wraps them so nothing raw
//! reaches the pipeline.

use async_trait::async_trait;
use relay_domain::execution::ExecutionContext;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failure reported by a tool handler. The message is preserved verbatim
/// in the resulting step error.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct HandlerError {
    pub message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for HandlerError {
    fn from(err: std::io::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// An invocable tool. Implementations perform whatever side effects the
/// tool is for (file I/O, subprocesses, network); the executive itself
/// performs none.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn run(
        &self,
        args: &HashMap<String, serde_json::Value>,
        context: &ExecutionContext,
    ) -> Result<String, HandlerError>;
}

// -- Argument helpers for handler implementations ---------------------------

pub fn get_str<'a>(args: &'a HashMap<String, serde_json::Value>, key: &str) -> Option<&'a str> {
    args.get(key).and_then(|v| v.as_str())
}

pub fn require_str<'a>(
    args: &'a HashMap<String, serde_json::Value>,
    key: &str,
) -> Result<&'a str, HandlerError> {
    get_str(args, key).ok_or_else(|| HandlerError::new(format!("missing argument: {}", key)))
}

pub fn get_u64(args: &HashMap<String, serde_json::Value>, key: &str) -> Option<u64> {
    args.get(key).and_then(|v| v.as_u64())
}

pub fn get_bool(args: &HashMap<String, serde_json::Value>, key: &str) -> Option<bool> {
    args.get(key).and_then(|v| v.as_bool())
}

/// Resolve a possibly-relative path against the execution context's
/// working directory.
pub fn resolve_path(context: &ExecutionContext, path: &str) -> PathBuf {
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        return candidate.to_path_buf();
    }
    match &context.working_directory {
        Some(base) => base.join(candidate),
        None => candidate.to_path_buf(),
    }
}
