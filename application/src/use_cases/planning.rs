//! Planning use case: request → planning prompt → model → validated plan.
//!
//! Failure handling here is the security boundary the whole design hangs
//! on: when the planner is unreachable or its output does not parse, the
//! error propagates and the execution aborts. There is deliberately no
//! code path that wraps the raw user request into a command step.

use crate::ports::model_gateway::ModelGateway;
use relay_domain::plan::entities::Plan;
use relay_domain::plan::parser::{PlanningError, parse_plan};
use relay_domain::prompt::{PlanningPrompt, Turn};
use relay_domain::routing::value_objects::{CompletionRequest, ModelResponse};
use relay_domain::tool::entities::ToolCatalog;
use std::collections::HashSet;
use tracing::debug;

/// Request a plan for `request` and parse it strictly.
///
/// Returns the plan together with the response metadata (which model
/// served the call, usage) for telemetry and cost accounting.
pub async fn plan_with_gateway<G: ModelGateway + ?Sized>(
    gateway: &G,
    request: &str,
    history: &[Turn],
    catalog: &ToolCatalog,
    allowlist: Option<&HashSet<String>>,
) -> Result<(Plan, ModelResponse), PlanningError> {
    let prompt = PlanningPrompt::planning(request, catalog, history);
    let completion = CompletionRequest::new(prompt).with_system(PlanningPrompt::system());

    let response = gateway
        .complete(completion)
        .await
        .map_err(|e| PlanningError::PlannerUnavailable(e.to_string()))?;

    debug!(model = %response.model, "planner responded, parsing plan");

    let plan = parse_plan(&response.content, catalog, allowlist)?;
    Ok((plan, response))
}
