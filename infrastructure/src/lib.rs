//! Infrastructure layer for agent-relay
//!
//! Concrete adapters behind the application ports: the tool registry and
//! executive with builtin handlers, the model router with per-model
//! circuit breakers and HTTP provider adapters, figment-based config
//! loading, and telemetry sinks.

pub mod config;
pub mod providers;
pub mod telemetry;
pub mod tools;

pub use config::{ConfigLoader, FileConfig};
pub use providers::{AnthropicAdapter, ModelRouter, OpenAiCompatAdapter, ProviderAdapter};
pub use telemetry::{ChannelTelemetry, JsonlTelemetry, TracingTelemetry};
pub use tools::{ToolExecutive, ToolHandler, ToolRegistry, builtin_registry};
