//! Asynchronous execution queue.
//!
//! Queue-oriented variant of the pipeline API: `submit` starts an
//! execution on a background task and returns an [`ExecutionId`];
//! callers poll `status` (or `take_result`) for the outcome.

use crate::ports::model_gateway::ModelGateway;
use crate::ports::tool_executor::ToolExecutorPort;
use crate::use_cases::pipeline::ToolPipeline;
use relay_domain::execution::{ExecutionContext, ExecutionId, ExecutionOptions, ExecutionResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Where a submitted execution currently stands.
#[derive(Debug, Clone)]
pub enum ExecutionStatus {
    Running,
    Completed(Box<ExecutionResult>),
    /// Execution-level failure (planning, cancellation); step-level
    /// failures are inside `Completed`.
    Failed(String),
}

impl ExecutionStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, ExecutionStatus::Running)
    }
}

/// Tracks in-flight and finished executions by id.
pub struct ExecutionQueue<G, T> {
    pipeline: ToolPipeline<G, T>,
    executions: Arc<Mutex<HashMap<ExecutionId, ExecutionStatus>>>,
}

impl<G, T> ExecutionQueue<G, T>
where
    G: ModelGateway + 'static,
    T: ToolExecutorPort + 'static,
{
    pub fn new(pipeline: ToolPipeline<G, T>) -> Self {
        Self {
            pipeline,
            executions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start an execution in the background and return its id.
    pub async fn submit(
        &self,
        request: String,
        context: ExecutionContext,
        options: ExecutionOptions,
    ) -> ExecutionId {
        let id = ExecutionId::new(uuid::Uuid::new_v4().to_string());
        debug!(execution_id = %id, "submitting execution");

        self.executions
            .lock()
            .await
            .insert(id.clone(), ExecutionStatus::Running);

        let pipeline = self.pipeline.clone();
        let executions = Arc::clone(&self.executions);
        let task_id = id.clone();
        tokio::spawn(async move {
            let status = match pipeline.execute(&request, &context, options).await {
                Ok(result) => ExecutionStatus::Completed(Box::new(result)),
                Err(error) => ExecutionStatus::Failed(error.to_string()),
            };
            executions.lock().await.insert(task_id, status);
        });

        id
    }

    /// Current status of an execution, if the id is known.
    pub async fn status(&self, id: &ExecutionId) -> Option<ExecutionStatus> {
        self.executions.lock().await.get(id).cloned()
    }

    /// Remove and return a finished execution. Running executions are
    /// left in place and returned as `Running` without being removed.
    pub async fn take_result(&self, id: &ExecutionId) -> Option<ExecutionStatus> {
        let mut executions = self.executions.lock().await;
        match executions.get(id) {
            Some(ExecutionStatus::Running) => Some(ExecutionStatus::Running),
            Some(_) => executions.remove(id),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::model_gateway::RouterError;
    use async_trait::async_trait;
    use relay_domain::plan::entities::Step;
    use relay_domain::routing::value_objects::{CompletionRequest, ModelResponse};
    use relay_domain::tool::entities::{RiskLevel, ToolCatalog, ToolDefinition};
    use relay_domain::tool::value_objects::StepError;
    use std::time::Duration;

    struct NoopGateway;

    #[async_trait]
    impl ModelGateway for NoopGateway {
        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<ModelResponse, RouterError> {
            Err(RouterError::AllModelsUnavailable {
                attempts: 0,
                detail: "no models in test".to_string(),
            })
        }
    }

    struct EchoExecutor {
        catalog: ToolCatalog,
    }

    impl EchoExecutor {
        fn new() -> Arc<Self> {
            let mut catalog = ToolCatalog::new();
            catalog
                .insert(ToolDefinition::new("ok", "always succeeds", RiskLevel::Low))
                .unwrap();
            Arc::new(Self { catalog })
        }
    }

    #[async_trait]
    impl ToolExecutorPort for EchoExecutor {
        fn catalog(&self) -> ToolCatalog {
            self.catalog.clone()
        }

        async fn invoke(
            &self,
            step: &Step,
            _context: &ExecutionContext,
        ) -> Result<String, StepError> {
            Ok(format!("{} done", step.tool))
        }
    }

    fn queue() -> ExecutionQueue<NoopGateway, EchoExecutor> {
        let pipeline = ToolPipeline::new(Arc::new(NoopGateway), EchoExecutor::new());
        ExecutionQueue::new(pipeline)
    }

    async fn wait_until_finished(
        queue: &ExecutionQueue<NoopGateway, EchoExecutor>,
        id: &ExecutionId,
    ) -> ExecutionStatus {
        for _ in 0..100 {
            match queue.status(id).await {
                Some(status) if !status.is_running() => return status,
                _ => tokio::time::sleep(Duration::from_millis(10)).await,
            }
        }
        panic!("execution did not finish in time");
    }

    #[tokio::test]
    async fn test_submit_and_poll_result() {
        let queue = queue();
        let context = ExecutionContext::new("s", "t");
        let options =
            ExecutionOptions::default().with_provided_steps(vec![Step::new("ok")]);

        let id = queue.submit("run it".to_string(), context, options).await;
        let status = wait_until_finished(&queue, &id).await;

        match status {
            ExecutionStatus::Completed(result) => {
                assert!(result.success);
                assert_eq!(result.steps.len(), 1);
            }
            other => panic!("unexpected status: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_planning_failure_reported_as_failed() {
        let queue = queue();
        let context = ExecutionContext::new("s", "t");

        // No provided steps: auto-planning hits the dead gateway.
        let id = queue
            .submit("plan it".to_string(), context, ExecutionOptions::default())
            .await;
        let status = wait_until_finished(&queue, &id).await;

        assert!(matches!(status, ExecutionStatus::Failed(_)));
    }

    #[tokio::test]
    async fn test_take_result_removes_entry() {
        let queue = queue();
        let context = ExecutionContext::new("s", "t");
        let options =
            ExecutionOptions::default().with_provided_steps(vec![Step::new("ok")]);

        let id = queue.submit("run it".to_string(), context, options).await;
        wait_until_finished(&queue, &id).await;

        assert!(queue.take_result(&id).await.is_some());
        assert!(queue.take_result(&id).await.is_none());
        assert!(queue.status(&id).await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_id_is_none() {
        let queue = queue();
        let id = ExecutionId::new("nope");
        assert!(queue.status(&id).await.is_none());
    }
}
