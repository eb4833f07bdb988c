//! File system tools: read_file, write_file, list_directory

use super::handler::{
    HandlerError, ToolHandler, get_bool, get_u64, require_str, resolve_path,
};
use async_trait::async_trait;
use relay_domain::execution::ExecutionContext;
use relay_domain::tool::entities::{ParamType, RiskLevel, ToolDefinition, ToolParameter};
use std::collections::HashMap;
use std::fs;

/// Tool name constants
pub const READ_FILE: &str = "read_file";
pub const WRITE_FILE: &str = "write_file";
pub const LIST_DIRECTORY: &str = "list_directory";

/// Maximum file size to read (10 MB)
const MAX_READ_SIZE: u64 = 10 * 1024 * 1024;

pub fn read_file_definition() -> ToolDefinition {
    ToolDefinition::new(
        READ_FILE,
        "Read the contents of a file at the specified path",
        RiskLevel::Low,
    )
    .with_parameter(ToolParameter::new("path", "Path to the file to read", true))
    .with_parameter(
        ToolParameter::new("offset", "Line number to start reading from (0-indexed)", false)
            .with_type(ParamType::Number),
    )
    .with_parameter(
        ToolParameter::new("limit", "Maximum number of lines to read", false)
            .with_type(ParamType::Number),
    )
}

pub fn write_file_definition() -> ToolDefinition {
    ToolDefinition::new(
        WRITE_FILE,
        "Write content to a file at the specified path. Creates the file if it doesn't exist, or overwrites if it does.",
        RiskLevel::High,
    )
    .with_parameter(ToolParameter::new("path", "Path to the file to write", true))
    .with_parameter(ToolParameter::new("content", "Content to write to the file", true))
    .with_parameter(
        ToolParameter::new("create_dirs", "Create parent directories if they don't exist", false)
            .with_type(ParamType::Boolean)
            .with_default(false),
    )
}

pub fn list_directory_definition() -> ToolDefinition {
    ToolDefinition::new(
        LIST_DIRECTORY,
        "List the entries of a directory, one per line; directories carry a trailing '/'",
        RiskLevel::Low,
    )
    .with_parameter(
        ToolParameter::new("path", "Directory to list", false).with_default("."),
    )
}

pub struct ReadFileHandler;

#[async_trait]
impl ToolHandler for ReadFileHandler {
    async fn run(
        &self,
        args: &HashMap<String, serde_json::Value>,
        context: &ExecutionContext,
    ) -> Result<String, HandlerError> {
        let path_str = require_str(args, "path")?;
        let path = resolve_path(context, path_str);

        if !path.exists() {
            return Err(HandlerError::new(format!("file not found: {}", path_str)));
        }
        if !path.is_file() {
            return Err(HandlerError::new(format!("'{}' is not a file", path_str)));
        }

        let metadata = fs::metadata(&path)?;
        if metadata.len() > MAX_READ_SIZE {
            return Err(HandlerError::new(format!(
                "file too large ({} bytes), maximum is {} bytes",
                metadata.len(),
                MAX_READ_SIZE
            )));
        }

        let content = fs::read_to_string(&path)?;

        let offset = get_u64(args, "offset").unwrap_or(0) as usize;
        let limit = get_u64(args, "limit");
        if offset == 0 && limit.is_none() {
            return Ok(content);
        }

        let lines: Vec<&str> = content.lines().collect();
        let end = match limit {
            Some(limit) => (offset + limit as usize).min(lines.len()),
            None => lines.len(),
        };
        if offset >= lines.len() {
            return Ok(String::new());
        }
        Ok(lines[offset..end].join("\n"))
    }
}

pub struct WriteFileHandler;

#[async_trait]
impl ToolHandler for WriteFileHandler {
    async fn run(
        &self,
        args: &HashMap<String, serde_json::Value>,
        context: &ExecutionContext,
    ) -> Result<String, HandlerError> {
        let path_str = require_str(args, "path")?;
        let content = require_str(args, "content")?;
        let path = resolve_path(context, path_str);

        if get_bool(args, "create_dirs").unwrap_or(false)
            && let Some(parent) = path.parent()
        {
            fs::create_dir_all(parent)?;
        }

        fs::write(&path, content)?;
        Ok(format!("wrote {} bytes to {}", content.len(), path_str))
    }
}

pub struct ListDirectoryHandler;

#[async_trait]
impl ToolHandler for ListDirectoryHandler {
    async fn run(
        &self,
        args: &HashMap<String, serde_json::Value>,
        context: &ExecutionContext,
    ) -> Result<String, HandlerError> {
        let path_str = get_str_or_dot(args);
        let path = resolve_path(context, path_str);

        if !path.is_dir() {
            return Err(HandlerError::new(format!(
                "'{}' is not a directory",
                path_str
            )));
        }

        let mut entries = Vec::new();
        for entry in fs::read_dir(&path)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type()?.is_dir() {
                entries.push(format!("{}/", name));
            } else {
                entries.push(name);
            }
        }
        entries.sort();
        Ok(entries.join("\n"))
    }
}

fn get_str_or_dot(args: &HashMap<String, serde_json::Value>) -> &str {
    args.get("path").and_then(|v| v.as_str()).unwrap_or(".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, tempdir};

    fn args(pairs: &[(&str, serde_json::Value)]) -> HashMap<String, serde_json::Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn context() -> ExecutionContext {
        ExecutionContext::new("s", "t")
    }

    #[tokio::test]
    async fn test_read_file() {
        let mut temp = NamedTempFile::new().unwrap();
        writeln!(temp, "line one").unwrap();
        writeln!(temp, "line two").unwrap();
        let path = temp.path().to_str().unwrap();

        let output = ReadFileHandler
            .run(&args(&[("path", serde_json::json!(path))]), &context())
            .await
            .unwrap();
        assert!(output.contains("line one"));

        let output = ReadFileHandler
            .run(
                &args(&[
                    ("path", serde_json::json!(path)),
                    ("offset", serde_json::json!(1)),
                    ("limit", serde_json::json!(1)),
                ]),
                &context(),
            )
            .await
            .unwrap();
        assert_eq!(output, "line two");
    }

    #[tokio::test]
    async fn test_read_file_missing() {
        let err = ReadFileHandler
            .run(
                &args(&[("path", serde_json::json!("/no/such/file"))]),
                &context(),
            )
            .await
            .unwrap_err();
        assert!(err.message.contains("not found"));
    }

    #[tokio::test]
    async fn test_write_then_read_with_working_directory() {
        let dir = tempdir().unwrap();
        let context = ExecutionContext::new("s", "t").with_working_directory(dir.path());

        WriteFileHandler
            .run(
                &args(&[
                    ("path", serde_json::json!("out.txt")),
                    ("content", serde_json::json!("written content")),
                ]),
                &context,
            )
            .await
            .unwrap();

        let read_back = fs::read_to_string(dir.path().join("out.txt")).unwrap();
        assert_eq!(read_back, "written content");
    }

    #[tokio::test]
    async fn test_write_file_create_dirs() {
        let dir = tempdir().unwrap();
        let context = ExecutionContext::new("s", "t").with_working_directory(dir.path());

        WriteFileHandler
            .run(
                &args(&[
                    ("path", serde_json::json!("nested/deep/out.txt")),
                    ("content", serde_json::json!("x")),
                    ("create_dirs", serde_json::json!(true)),
                ]),
                &context,
            )
            .await
            .unwrap();

        assert!(dir.path().join("nested/deep/out.txt").exists());
    }

    #[tokio::test]
    async fn test_list_directory_marks_subdirectories() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "x").unwrap();
        fs::create_dir(dir.path().join("a_dir")).unwrap();

        let context = ExecutionContext::new("s", "t").with_working_directory(dir.path());
        let output = ListDirectoryHandler
            .run(&args(&[]), &context)
            .await
            .unwrap();

        assert_eq!(output, "a_dir/\nb.txt");
    }

    #[tokio::test]
    async fn test_list_directory_not_a_directory() {
        let temp = NamedTempFile::new().unwrap();
        let err = ListDirectoryHandler
            .run(
                &args(&[("path", serde_json::json!(temp.path().to_str().unwrap()))]),
                &context(),
            )
            .await
            .unwrap_err();
        assert!(err.message.contains("not a directory"));
    }
}
