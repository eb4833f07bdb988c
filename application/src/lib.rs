//! Application layer for agent-relay
//!
//! This crate defines the ports (abstract interfaces) the pipeline talks
//! through, and the use cases that orchestrate them: planning, step
//! scheduling, and the asynchronous execution queue. Implementations of
//! the ports (model router, tool executive, telemetry sinks) live in the
//! infrastructure layer.

pub mod ports;
pub mod use_cases;

pub use ports::model_gateway::{GatewayError, ModelGateway, RouterError};
pub use ports::telemetry::{NoTelemetry, TelemetryEvent, TelemetrySink};
pub use ports::tool_executor::ToolExecutorPort;
pub use use_cases::pipeline::{PipelineError, ToolPipeline};
pub use use_cases::planning::plan_with_gateway;
pub use use_cases::queue::{ExecutionQueue, ExecutionStatus};
