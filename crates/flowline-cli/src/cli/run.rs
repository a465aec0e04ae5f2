//! `flowline run`: execute a workflow against the configured providers.
//!
//! Exit codes: 0 success, 2 suspended (waiting for human input), 1 failed.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use serde_json::Value;

use flowline_core::workflow::outcome::existing_steps_from_logs;
use flowline_core::{ExecuteOptions, RequestContext, WorkflowEngine};
use flowline_infra::agent::AnthropicAgentProvider;
use flowline_infra::event_sink::{read_step_logs, JsonlEventSink};
use flowline_infra::repository::FsWorkflowRepository;
use flowline_infra::tool::builtin_tools;
use flowline_infra::InfraError;
use flowline_types::config::FlowlineConfig;
use flowline_types::execution::{ExecutionResult, ExecutionStatus, ResumeInput};

use super::inspect::step_table;
use super::validate::{display_name, load_definition};

/// Exit code for a run waiting on a human step.
const EXIT_SUSPENDED: u8 = 2;

#[derive(Args)]
pub struct RunArgs {
    /// Workflow file (.yaml, .yml or .json).
    pub file: PathBuf,

    /// Input as a JSON string.
    #[arg(long, conflicts_with = "input_file")]
    pub input: Option<String>,

    /// Read input JSON from a file.
    #[arg(long)]
    pub input_file: Option<PathBuf>,

    /// Tenant used to scope tool lookup.
    #[arg(long)]
    pub tenant: Option<String>,

    /// Append every step event to this JSONL file.
    #[arg(long)]
    pub events: Option<PathBuf>,

    /// Id of the suspended human step to complete.
    #[arg(long)]
    pub resume_step: Option<String>,

    /// JSON payload that completes the resumed step.
    #[arg(long, requires = "resume_step")]
    pub resume_data: Option<String>,

    /// Skip steps already completed in this JSONL event log.
    #[arg(long)]
    pub resume_from: Option<PathBuf>,
}

/// Process exit code for a finished run.
pub fn exit_code(status: ExecutionStatus) -> ExitCode {
    match status {
        ExecutionStatus::Success => ExitCode::SUCCESS,
        ExecutionStatus::Suspended => ExitCode::from(EXIT_SUSPENDED),
        ExecutionStatus::Failed => ExitCode::FAILURE,
    }
}

pub async fn run(
    args: RunArgs,
    config: &FlowlineConfig,
    json: bool,
    quiet: bool,
) -> Result<ExecutionStatus> {
    let def = load_definition(&args.file)?;
    let input = read_input(&args).await?;

    let mut options = ExecuteOptions::new();
    if let Some(path) = &args.resume_from {
        let logs = read_step_logs(path)
            .await
            .with_context(|| format!("Failed to read event log {}", path.display()))?;
        let existing = existing_steps_from_logs(&logs);
        tracing::info!(path = %path.display(), completed = existing.len(), "resuming from event log");
        options = options.with_existing_steps(existing);
    }
    if let Some(step_id) = &args.resume_step {
        let data = match &args.resume_data {
            Some(raw) => parse_json(raw, "--resume-data")?,
            None => Value::Null,
        };
        options = options.with_resume(ResumeInput {
            step_id: step_id.clone(),
            data,
        });
    }
    if let Some(tenant) = &args.tenant {
        options = options.with_request_context(RequestContext::new().with_tenant(tenant));
    }
    let mut event_log = None;
    if let Some(path) = &args.events {
        // Resuming into the same log keeps the earlier attempt's events.
        let sink = Arc::new(if args.resume_from.as_deref() == Some(path.as_path()) {
            JsonlEventSink::append(path)?
        } else {
            JsonlEventSink::create(path)?
        });
        options = options.with_shared_event_sink(sink.clone());
        event_log = Some(sink);
    }

    let engine = build_engine(config, &args.file)?;
    let result = engine.execute(&def, input, options).await;
    if let Some(sink) = event_log {
        sink.finish()
            .await
            .with_context(|| format!("Failed to write event log {}", sink.path().display()))?;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if !quiet {
        print_result(&display_name(&def, &args.file), &result, &args.file)?;
    }

    Ok(result.status)
}

/// Engine wired with the built-in tools, the filesystem repository and,
/// when an API key is available, Anthropic agents.
fn build_engine(config: &FlowlineConfig, file: &Path) -> Result<WorkflowEngine> {
    let workflows_dir = config
        .workflows_dir
        .clone()
        .or_else(|| file.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));

    let mut builder = WorkflowEngine::builder()
        .config(config.engine.clone())
        .tool_provider(builtin_tools()?)
        .workflow_repository(FsWorkflowRepository::new(workflows_dir));

    match AnthropicAgentProvider::from_env(&config.anthropic, config.agents.clone()) {
        Ok(provider) => builder = builder.agent_provider(provider),
        Err(InfraError::MissingApiKey(var)) => {
            tracing::warn!(env = %var, "no API key set, agent steps will fail");
        }
        Err(e) => return Err(e.into()),
    }

    Ok(builder.build())
}

async fn read_input(args: &RunArgs) -> Result<Value> {
    if let Some(raw) = &args.input {
        return parse_json(raw, "--input");
    }
    if let Some(path) = &args.input_file {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read input file {}", path.display()))?;
        return parse_json(&raw, "--input-file");
    }
    Ok(Value::Object(Default::default()))
}

fn parse_json(raw: &str, flag: &str) -> Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("{flag} is not valid JSON"))
}

fn print_result(name: &str, result: &ExecutionResult, file: &Path) -> Result<()> {
    println!();
    let (mark, label) = match result.status {
        ExecutionStatus::Success => (style("✓").green().bold(), style("succeeded").green()),
        ExecutionStatus::Suspended => (style("‖").magenta().bold(), style("suspended").magenta()),
        ExecutionStatus::Failed => (style("✗").red().bold(), style("failed").red()),
    };
    println!("  {mark} Workflow '{}' {label}", style(name).cyan());
    println!();

    if !result.steps.is_empty() {
        println!("{}", step_table(&result.steps));
        println!();
    }

    match result.status {
        ExecutionStatus::Success => {
            println!("  Output:");
            for line in serde_json::to_string_pretty(&result.output)?.lines() {
                println!("    {line}");
            }
        }
        ExecutionStatus::Suspended => {
            if let Some(suspension) = &result.suspended {
                println!(
                    "  Waiting on step '{}'",
                    style(&suspension.step_id).yellow()
                );
                if let Some(prompt) = suspension.data.get("prompt").and_then(Value::as_str) {
                    println!("  Prompt: {prompt}");
                }
                println!();
                println!(
                    "  Resume with: flowline run {} --resume-from <events.jsonl> --resume-step {} --resume-data '<json>'",
                    file.display(),
                    suspension.step_id
                );
            }
        }
        ExecutionStatus::Failed => {
            if let Some(error) = &result.error {
                println!("  Error: {}", style(error).red());
            }
        }
    }
    println!();
    Ok(())
}
