//! File-backed configuration schema.
//!
//! Mirrors the sections of `relay.toml`:
//!
//! ```toml
//! [[models]]
//! name = "gpt-4o-mini"
//! provider = "openai"
//! base_url = "https://api.openai.com/v1"
//! api_key_env = "OPENAI_API_KEY"
//! priority = 10
//! cost_per_token = 0.0000006
//!
//! [breaker]
//! failure_threshold = 5
//! cooldown_secs = 30
//!
//! [pipeline]
//! max_parallelism = 4
//! step_timeout_ms = 30000
//!
//! [tools]
//! allowlist = ["read_file", "list_directory"]
//! unknown_args = "reject"
//! ```

use relay_domain::execution::ExecutionOptions;
use relay_domain::routing::breaker::BreakerConfig;
use relay_domain::routing::model_config::ModelConfig;
use relay_domain::tool::validation::UnknownArgPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub models: Vec<ModelEntry>,
    #[serde(default)]
    pub breaker: BreakerSection,
    #[serde(default)]
    pub pipeline: PipelineSection,
    #[serde(default)]
    pub tools: ToolsSection,
}

/// One `[[models]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    pub name: String,
    /// "openai" (or any OpenAI-compatible endpoint) or "anthropic"
    pub provider: String,
    /// Base URL override for OpenAI-compatible endpoints
    #[serde(default)]
    pub base_url: Option<String>,
    /// Name of the environment variable holding the API key. Keys never
    /// live in the config file itself.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub priority: u32,
    #[serde(default)]
    pub cost_per_token: f64,
}

impl ModelEntry {
    /// Resolve into the domain config, reading the key from the
    /// environment when one is named.
    pub fn to_model_config(&self) -> ModelConfig {
        let mut config = ModelConfig::new(&self.name, &self.provider)
            .with_priority(self.priority)
            .with_cost_per_token(self.cost_per_token);
        if let Some(var) = &self.api_key_env
            && let Ok(key) = std::env::var(var)
        {
            config = config.with_api_key(key);
        }
        config
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerSection {
    pub failure_threshold: u32,
    pub failure_window_secs: u64,
    pub cooldown_secs: u64,
    pub half_open_max_probes: u32,
}

impl Default for BreakerSection {
    fn default() -> Self {
        let defaults = BreakerConfig::default();
        Self {
            failure_threshold: defaults.failure_threshold,
            failure_window_secs: defaults.failure_window.as_secs(),
            cooldown_secs: defaults.cooldown.as_secs(),
            half_open_max_probes: defaults.half_open_max_probes,
        }
    }
}

impl BreakerSection {
    pub fn to_breaker_config(&self) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: self.failure_threshold,
            failure_window: Duration::from_secs(self.failure_window_secs),
            cooldown: Duration::from_secs(self.cooldown_secs),
            half_open_max_probes: self.half_open_max_probes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSection {
    pub auto_planning: bool,
    pub allow_unsafe_tools: bool,
    pub max_parallelism: usize,
    pub timeout_ms: u64,
    pub step_timeout_ms: u64,
    pub continue_on_error: bool,
}

impl Default for PipelineSection {
    fn default() -> Self {
        let defaults = ExecutionOptions::default();
        Self {
            auto_planning: defaults.auto_planning,
            allow_unsafe_tools: defaults.allow_unsafe_tools,
            max_parallelism: defaults.max_parallelism,
            timeout_ms: defaults.timeout_ms,
            step_timeout_ms: defaults.step_timeout_ms,
            continue_on_error: defaults.continue_on_error,
        }
    }
}

impl PipelineSection {
    pub fn to_options(&self) -> ExecutionOptions {
        let mut options = ExecutionOptions::default()
            .with_max_parallelism(self.max_parallelism)
            .with_timeout_ms(self.timeout_ms)
            .with_step_timeout_ms(self.step_timeout_ms);
        options.auto_planning = self.auto_planning;
        options.allow_unsafe_tools = self.allow_unsafe_tools;
        options.continue_on_error = self.continue_on_error;
        options
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsSection {
    /// When set, only these tools may execute.
    #[serde(default)]
    pub allowlist: Option<Vec<String>>,
    /// "reject" (default) or "passthrough"
    #[serde(default)]
    pub unknown_args: UnknownArgPolicy,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            allowlist: None,
            unknown_args: UnknownArgPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_domain_defaults() {
        let config = FileConfig::default();
        assert!(config.models.is_empty());
        assert_eq!(config.breaker.failure_threshold, 5);
        assert_eq!(config.breaker.cooldown_secs, 30);
        assert_eq!(config.breaker.half_open_max_probes, 1);
        assert_eq!(config.pipeline.max_parallelism, 4);
        assert!(config.tools.allowlist.is_none());
    }

    #[test]
    fn test_parse_full_toml() {
        let raw = r#"
            [[models]]
            name = "gpt-4o-mini"
            provider = "openai"
            priority = 10
            cost_per_token = 0.0000006

            [[models]]
            name = "claude-haiku"
            provider = "anthropic"
            priority = 5

            [breaker]
            failure_threshold = 3
            failure_window_secs = 30
            cooldown_secs = 10
            half_open_max_probes = 1

            [pipeline]
            auto_planning = true
            allow_unsafe_tools = false
            max_parallelism = 2
            timeout_ms = 60000
            step_timeout_ms = 15000
            continue_on_error = false

            [tools]
            allowlist = ["read_file", "list_directory"]
            unknown_args = "passthrough"
        "#;

        let config: FileConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.models.len(), 2);
        assert_eq!(config.models[0].name, "gpt-4o-mini");
        assert_eq!(config.breaker.failure_threshold, 3);
        assert_eq!(config.pipeline.max_parallelism, 2);
        assert_eq!(
            config.tools.allowlist.as_deref(),
            Some(&["read_file".to_string(), "list_directory".to_string()][..])
        );
        assert_eq!(config.tools.unknown_args, UnknownArgPolicy::Passthrough);
    }

    #[test]
    fn test_breaker_section_conversion() {
        let section = BreakerSection {
            failure_threshold: 2,
            failure_window_secs: 10,
            cooldown_secs: 5,
            half_open_max_probes: 2,
        };
        let config = section.to_breaker_config();
        assert_eq!(config.failure_threshold, 2);
        assert_eq!(config.cooldown, Duration::from_secs(5));
    }

    #[test]
    fn test_pipeline_section_conversion() {
        let section = PipelineSection {
            max_parallelism: 8,
            continue_on_error: true,
            ..Default::default()
        };
        let options = section.to_options();
        assert_eq!(options.max_parallelism, 8);
        assert!(options.continue_on_error);
    }
}
