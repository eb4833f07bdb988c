//! CLI entrypoint for agent-relay
//!
//! Wires the layers together with dependency injection: config →
//! provider adapters → model router → tool registry/executive → pipeline.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use relay_application::ToolPipeline;
use relay_application::ports::telemetry::TelemetrySink;
use relay_domain::execution::{ExecutionContext, ExecutionOptions, ExecutionResult};
use relay_domain::plan::parser::parse_plan;
use relay_infrastructure::config::{ConfigLoader, FileConfig};
use relay_infrastructure::providers::{
    AnthropicAdapter, ModelRouter, OpenAiCompatAdapter, ProviderAdapter,
};
use relay_infrastructure::telemetry::TracingTelemetry;
use relay_infrastructure::tools::{ToolExecutive, builtin_registry};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Parser)]
#[command(name = "relay", about = "Plan and execute tool pipelines with resilient model routing")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Explicit config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Plan a request with the configured models and execute the result
    Run {
        /// The request to plan and execute
        request: String,

        #[command(flatten)]
        flags: ExecutionFlags,
    },
    /// Execute a plan from a JSON file, skipping the planner
    Exec {
        /// Path to the plan JSON ({"steps": [...], ...})
        plan: PathBuf,

        #[command(flatten)]
        flags: ExecutionFlags,
    },
    /// List the registered tools
    Tools,
}

#[derive(clap::Args)]
struct ExecutionFlags {
    /// Concurrency cap for independent steps
    #[arg(long)]
    max_parallelism: Option<usize>,

    /// Whole-pipeline timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Per-step timeout in milliseconds
    #[arg(long)]
    step_timeout_ms: Option<u64>,

    /// Keep executing after a step fails
    #[arg(long)]
    continue_on_error: bool,

    /// Admit high-risk tools (write_file, run_command)
    #[arg(long)]
    allow_unsafe: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    output: Output,
}

#[derive(Clone, Copy, ValueEnum)]
enum Output {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = ConfigLoader::load(cli.config.as_ref())
        .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;

    match cli.command {
        Command::Run { request, flags } => run(&config, &request, &flags).await,
        Command::Exec { plan, flags } => exec(&config, &plan, &flags).await,
        Command::Tools => {
            let catalog = builtin_registry().catalog();
            let mut tools: Vec<_> = catalog.all().collect();
            tools.sort_by(|a, b| a.name.cmp(&b.name));
            for tool in tools {
                println!("{:<16} [{}] {}", tool.name, tool.risk_level, tool.description);
            }
            Ok(())
        }
    }
}

fn build_router(config: &FileConfig) -> Result<ModelRouter> {
    let mut router = ModelRouter::new(config.breaker.to_breaker_config())
        .with_telemetry(Arc::new(TracingTelemetry) as Arc<dyn TelemetrySink>);

    for entry in &config.models {
        let model = entry.to_model_config();
        let adapter: Arc<dyn ProviderAdapter> = match entry.provider.as_str() {
            "anthropic" => {
                let api_key = model.api_key.clone().with_context(|| {
                    format!("model '{}' needs api_key_env set and exported", entry.name)
                })?;
                let mut adapter = AnthropicAdapter::new(api_key);
                if let Some(base_url) = &entry.base_url {
                    adapter = adapter.with_base_url(base_url);
                }
                Arc::new(adapter)
            }
            _ => {
                let base_url = entry
                    .base_url
                    .clone()
                    .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string());
                let mut adapter = OpenAiCompatAdapter::new(base_url);
                if let Some(api_key) = &model.api_key {
                    adapter = adapter.with_api_key(api_key);
                }
                Arc::new(adapter)
            }
        };
        router = router.register(model, adapter);
    }

    Ok(router)
}

fn build_executive(config: &FileConfig) -> ToolExecutive {
    let registry = Arc::new(builtin_registry());
    let mut executive =
        ToolExecutive::new(registry).with_unknown_args(config.tools.unknown_args);
    if let Some(allowlist) = &config.tools.allowlist {
        executive = executive.with_allowlist(allowlist.iter().cloned());
    }
    executive
}

fn build_pipeline(config: &FileConfig) -> Result<ToolPipeline<ModelRouter, ToolExecutive>> {
    let router = Arc::new(build_router(config)?);
    let executive = Arc::new(build_executive(config));
    Ok(ToolPipeline::new(router, executive)
        .with_telemetry(Arc::new(TracingTelemetry) as Arc<dyn TelemetrySink>))
}

fn build_context() -> Result<ExecutionContext> {
    let context = ExecutionContext::new(
        uuid::Uuid::new_v4().to_string(),
        uuid::Uuid::new_v4().to_string(),
    )
    .with_working_directory(std::env::current_dir()?);
    Ok(context)
}

fn build_options(config: &FileConfig, flags: &ExecutionFlags) -> ExecutionOptions {
    let mut options = config.pipeline.to_options();
    if let Some(max_parallelism) = flags.max_parallelism {
        options = options.with_max_parallelism(max_parallelism);
    }
    if let Some(timeout_ms) = flags.timeout_ms {
        options = options.with_timeout_ms(timeout_ms);
    }
    if let Some(step_timeout_ms) = flags.step_timeout_ms {
        options = options.with_step_timeout_ms(step_timeout_ms);
    }
    if flags.continue_on_error {
        options.continue_on_error = true;
    }
    if flags.allow_unsafe {
        options.allow_unsafe_tools = true;
    }
    options
}

async fn run(config: &FileConfig, request: &str, flags: &ExecutionFlags) -> Result<()> {
    if config.models.is_empty() {
        bail!("no models configured; add a [[models]] entry to relay.toml");
    }

    let pipeline = build_pipeline(config)?;
    let context = build_context()?;
    let options = build_options(config, flags);

    info!(request, "planning and executing");
    let result = pipeline.execute(request, &context, options).await?;
    print_result(&result, flags.output)
}

async fn exec(config: &FileConfig, plan_path: &PathBuf, flags: &ExecutionFlags) -> Result<()> {
    let raw = std::fs::read_to_string(plan_path)
        .with_context(|| format!("failed to read plan file {}", plan_path.display()))?;

    let allowlist: Option<HashSet<String>> = config
        .tools
        .allowlist
        .as_ref()
        .map(|list| list.iter().cloned().collect());
    let catalog = builtin_registry().catalog();
    let plan = parse_plan(&raw, &catalog, allowlist.as_ref())?;

    let pipeline = build_pipeline(config)?;
    let context = build_context()?;
    let options = build_options(config, flags);

    info!(steps = plan.len(), "executing provided plan");
    let result = pipeline.execute_plan(plan, &context, options).await?;
    print_result(&result, flags.output)
}

fn print_result(result: &ExecutionResult, output: Output) -> Result<()> {
    match output {
        Output::Json => {
            println!("{}", serde_json::to_string_pretty(result)?);
        }
        Output::Text => {
            for (index, step) in result.steps.iter().enumerate() {
                let mark = if step.is_success() { "ok" } else { "FAILED" };
                println!("[{}] {:<16} {} ({} ms)", index, step.tool, mark, step.latency_ms);
                if let Some(error) = step.error() {
                    println!("    error: {}", error);
                }
            }
            match &result.final_output {
                Some(final_output) => println!("\n{}", final_output),
                None => println!("(no output)"),
            }
            println!(
                "\n{} in {} ms",
                if result.success { "succeeded" } else { "failed" },
                result.total_time_ms
            );
        }
    }

    if result.success {
        Ok(())
    } else {
        std::process::exit(1);
    }
}
