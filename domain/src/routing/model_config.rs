//! Static per-model configuration.
//!
//! [`ModelConfig`] is loaded once at startup and read-only thereafter.
//! Routing priority and cost accounting both come from here.

use serde::{Deserialize, Serialize};

/// Configuration for one upstream model endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model identifier sent to the provider (e.g., "gpt-4o-mini")
    pub name: String,
    /// Provider this model is served by (e.g., "openai", "anthropic")
    pub provider: String,
    /// API key for the provider, if the endpoint needs one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Routing priority; higher is tried first
    pub priority: u32,
    /// Cost per token, used for usage accounting
    pub cost_per_token: f64,
}

impl ModelConfig {
    pub fn new(name: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider: provider.into(),
            api_key: None,
            priority: 0,
            cost_per_token: 0.0,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_cost_per_token(mut self, cost_per_token: f64) -> Self {
        self.cost_per_token = cost_per_token;
        self
    }
}
