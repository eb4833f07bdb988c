//! Routing value objects: completion requests, responses, usage.

use serde::{Deserialize, Serialize};

/// A single completion request, provider-agnostic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// System instructions, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// The user-facing prompt
    pub prompt: String,
    /// Sampling temperature override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Completion token cap
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Token usage reported by a provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// A completed model call: text plus usage and cost accounting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    /// Model that actually served the request (after fallback)
    pub model: String,
    /// Response text
    pub content: String,
    /// Token usage, zeroed when the provider reports none
    #[serde(default)]
    pub usage: TokenUsage,
    /// Cost in account currency, derived from usage and per-model rate
    #[serde(default)]
    pub cost: f64,
}

impl ModelResponse {
    pub fn new(model: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            content: content.into(),
            usage: TokenUsage::default(),
            cost: 0.0,
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = usage;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_total() {
        let usage = TokenUsage {
            prompt_tokens: 120,
            completion_tokens: 30,
        };
        assert_eq!(usage.total(), 150);
    }

    #[test]
    fn test_request_builder() {
        let request = CompletionRequest::new("plan this")
            .with_system("you are a planner")
            .with_max_tokens(512);

        assert_eq!(request.prompt, "plan this");
        assert_eq!(request.system.as_deref(), Some("you are a planner"));
        assert_eq!(request.max_tokens, Some(512));
    }
}
