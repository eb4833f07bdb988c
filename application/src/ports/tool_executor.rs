//! Tool executor port
//!
//! Defines how the pipeline validates and invokes a single tool call.
//! The adapter behind this port performs lookup, allowlist and schema
//! checks, then runs the registered handler — and nothing else. Timing
//! and timeouts are the scheduler's concern.

use async_trait::async_trait;
use relay_domain::execution::ExecutionContext;
use relay_domain::plan::entities::Step;
use relay_domain::tool::entities::ToolCatalog;
use relay_domain::tool::value_objects::StepError;
use std::collections::HashSet;

/// Port for validated tool invocation.
#[async_trait]
pub trait ToolExecutorPort: Send + Sync {
    /// Snapshot of the registered tool definitions.
    fn catalog(&self) -> ToolCatalog;

    /// The configured allowlist, if any.
    ///
    /// The executive enforces it on every invocation; the pipeline also
    /// hands it to the plan parser so a disallowed tool fails planning
    /// before anything runs.
    fn allowlist(&self) -> Option<HashSet<String>> {
        None
    }

    /// Check if a tool is available.
    fn has_tool(&self, name: &str) -> bool {
        self.catalog().contains(name)
    }

    /// Validate and invoke one step, returning the handler's output.
    ///
    /// All failure modes come back as a typed [`StepError`]; raw handler
    /// errors never escape.
    async fn invoke(&self, step: &Step, context: &ExecutionContext) -> Result<String, StepError>;
}
