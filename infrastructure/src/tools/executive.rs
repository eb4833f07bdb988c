//! Tool executive — the concrete implementation of [`ToolExecutorPort`].
//!
//! Invocation path for every step:
//!
//! ```text
//! invoke(step, context)
//!   1. registry lookup            → ToolNotFound
//!   2. allowlist check            → Policy
//!   3. argument validation        → Validation (type/required/unknown)
//!   4. handler.run(effective args) → Execution on handler failure
//! ```
//!
//! The executive performs no side effects of its own — validation,
//! timing hooks and logging only. Per-step deadlines are enforced by the
//! pipeline's scheduler around this call.

use super::registry::ToolRegistry;
use async_trait::async_trait;
use relay_application::ports::tool_executor::ToolExecutorPort;
use relay_domain::execution::ExecutionContext;
use relay_domain::plan::entities::Step;
use relay_domain::tool::entities::ToolCatalog;
use relay_domain::tool::validation::{UnknownArgPolicy, validate_args};
use relay_domain::tool::value_objects::StepError;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Validates and invokes tool calls against an injected [`ToolRegistry`].
pub struct ToolExecutive {
    registry: Arc<ToolRegistry>,
    allowlist: Option<HashSet<String>>,
    unknown_args: UnknownArgPolicy,
}

impl ToolExecutive {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            allowlist: None,
            unknown_args: UnknownArgPolicy::default(),
        }
    }

    /// Restrict execution to the named tools.
    pub fn with_allowlist<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowlist = Some(tools.into_iter().map(Into::into).collect());
        self
    }

    /// Configure what happens to arguments outside the declared schema.
    pub fn with_unknown_args(mut self, policy: UnknownArgPolicy) -> Self {
        self.unknown_args = policy;
        self
    }
}

#[async_trait]
impl ToolExecutorPort for ToolExecutive {
    fn catalog(&self) -> ToolCatalog {
        self.registry.catalog()
    }

    fn allowlist(&self) -> Option<HashSet<String>> {
        self.allowlist.clone()
    }

    async fn invoke(&self, step: &Step, context: &ExecutionContext) -> Result<String, StepError> {
        let Some((definition, handler)) = self.registry.lookup(&step.tool) else {
            return Err(StepError::ToolNotFound {
                tool: step.tool.clone(),
            });
        };

        if let Some(allowlist) = &self.allowlist
            && !allowlist.contains(&step.tool)
        {
            return Err(StepError::Policy {
                tool: step.tool.clone(),
                reason: "not in the configured allowlist".to_string(),
            });
        }

        let effective_args = validate_args(&definition, &step.args, self.unknown_args).map_err(
            |message| StepError::Validation {
                tool: step.tool.clone(),
                message,
            },
        )?;

        let begin = Instant::now();
        debug!(tool = %step.tool, trace_id = %context.trace_id, "invoking tool");

        let outcome = handler.run(&effective_args, context).await;
        let elapsed_ms = begin.elapsed().as_millis() as u64;

        match outcome {
            Ok(output) => {
                debug!(tool = %step.tool, elapsed_ms, "tool finished");
                Ok(output)
            }
            Err(error) => {
                warn!(tool = %step.tool, elapsed_ms, error = %error, "tool failed");
                Err(StepError::Execution {
                    tool: step.tool.clone(),
                    message: error.to_string(),
                })
            }
        }
    }
}
