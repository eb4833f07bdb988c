//! Model gateway port
//!
//! Defines how the pipeline obtains completions from upstream language
//! models. The infrastructure adapter behind this port (the model router)
//! owns all resilience decisions: priority ordering, circuit breaking,
//! and bounded fallback. Callers see one of two terminal failures and
//! never retry on their own.

use async_trait::async_trait;
use relay_domain::routing::value_objects::{CompletionRequest, ModelResponse};
use thiserror::Error;

/// Transport-level failure of a single provider call.
///
/// Recorded against that provider's circuit breaker; never surfaced to
/// pipeline callers directly.
#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    #[error("connection error: {0}")]
    ConnectionError(String),

    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("provider returned an unusable response: {0}")]
    InvalidResponse(String),

    #[error("request timed out")]
    Timeout,
}

/// Terminal routing failure, surfaced to the pipeline.
#[derive(Error, Debug, Clone)]
pub enum RouterError {
    /// Every candidate model was short-circuited by an open breaker;
    /// no network call was attempted.
    #[error("circuit open: {0}")]
    CircuitOpen(String),

    /// Fallback ran out of models.
    #[error("all models unavailable after {attempts} attempt(s): {detail}")]
    AllModelsUnavailable { attempts: usize, detail: String },
}

/// Gateway for model completions.
///
/// One call may fan out across several configured models internally; the
/// response names the model that actually served it.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<ModelResponse, RouterError>;
}
