//! Model provider adapters and the resilient router.

pub mod anthropic;
pub mod openai_compat;
mod router;

pub use anthropic::AnthropicAdapter;
pub use openai_compat::OpenAiCompatAdapter;
pub use router::ModelRouter;

use async_trait::async_trait;
use relay_application::ports::model_gateway::GatewayError;
use relay_domain::routing::value_objects::{CompletionRequest, ModelResponse};

/// Which provider API an adapter speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAiCompat,
    Anthropic,
}

impl ProviderKind {
    pub fn as_str(&self) -> &str {
        match self {
            ProviderKind::OpenAiCompat => "openai",
            ProviderKind::Anthropic => "anthropic",
        }
    }
}

/// One upstream provider endpoint.
///
/// Adapters do transport only: a single attempt per call, typed errors
/// out. Retry, fallback and circuit breaking all live in [`ModelRouter`].
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn complete(
        &self,
        model: &str,
        request: &CompletionRequest,
    ) -> Result<ModelResponse, GatewayError>;
}
