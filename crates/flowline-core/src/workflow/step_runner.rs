//! Step dispatcher for all 9 workflow step types.
//!
//! `StepRunner` walks a step list in order. For each step it resolves the
//! step input, dispatches on the `StepConfig` variant, seals an
//! `ExecutionStepLog`, records the output in the context and either moves on
//! or halts the list on failure/suspension.
//!
//! Step types: Agent, Tool, Workflow, Branch, Parallel, Foreach, Human,
//! Transform, Delay.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use flowline_types::config::EngineConfig;
use flowline_types::execution::{ExecutionStepLog, ResumeInput, StepStatus, Suspension};
use flowline_types::workflow::{
    AgentConfig, BranchConfig, DelayConfig, ForeachConfig, HumanConfig, OutputFormat,
    ParallelConfig, StepConfig, SubWorkflowConfig, ToolConfig, WorkflowDefinition, WorkflowStep,
};
use futures_util::stream::{FuturesUnordered, StreamExt};
use serde_json::{json, Value};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::Instrument;
use uuid::Uuid;

use crate::capability::agent::{GenerateOptions, SharedAgentProvider};
use crate::capability::event::SharedStepEventSink;
use crate::capability::repository::SharedWorkflowRepository;
use crate::capability::request_context::RequestContext;
use crate::capability::tool::SharedToolProvider;
use crate::capability::{BoxFuture, CapabilityError};

use super::context::ExecutionContext;
use super::expression::ConditionEvaluator;
use super::outcome::{join_outcomes, ListOutcome};
use super::template::{
    is_template, resolve_input_mapping, resolve_template, resolve_template_value, stringify_value,
};

// ---------------------------------------------------------------------------
// StepError
// ---------------------------------------------------------------------------

/// Errors that fail a single step. Recorded on its log via `Display`.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// The step's configuration cannot be executed as written.
    #[error("{0}")]
    Configuration(String),

    /// A capability provider reported an error.
    #[error(transparent)]
    Capability(#[from] CapabilityError),
}

// ---------------------------------------------------------------------------
// RunScope
// ---------------------------------------------------------------------------

/// Per-run state shared by every step of one run, cheap to clone into
/// concurrent branches.
#[derive(Clone)]
pub(crate) struct RunScope {
    pub run_id: Uuid,
    pub depth: u32,
    pub resume: Option<Arc<ResumeInput>>,
    pub existing: Arc<HashMap<String, Value>>,
    pub request: Arc<RequestContext>,
    pub sink: Option<SharedStepEventSink>,
    pub iteration_index: Option<usize>,
}

impl RunScope {
    /// Scope for a nested workflow run one level deeper.
    pub fn nested(&self) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            depth: self.depth + 1,
            ..self.clone()
        }
    }

    fn for_iteration(&self, index: usize) -> Self {
        Self {
            iteration_index: Some(index),
            ..self.clone()
        }
    }

    fn resume_for(&self, step_id: &str) -> Option<&ResumeInput> {
        self.resume
            .as_deref()
            .filter(|resume| resume.step_id == step_id)
    }
}

// ---------------------------------------------------------------------------
// StepRunner
// ---------------------------------------------------------------------------

/// Executes workflow steps by dispatching to type-specific handlers.
///
/// Cloning is cheap: providers and config are shared behind `Arc`s.
#[derive(Clone)]
pub struct StepRunner {
    pub(crate) config: Arc<EngineConfig>,
    pub(crate) agents: Option<SharedAgentProvider>,
    pub(crate) tools: Option<SharedToolProvider>,
    pub(crate) repository: Option<SharedWorkflowRepository>,
    pub(crate) registered: Arc<HashMap<String, Arc<WorkflowDefinition>>>,
    pub(crate) conditions: ConditionEvaluator,
}

impl StepRunner {
    /// Run a step list sequentially, halting on the first failure or
    /// suspension. Logs are appended to `logs` as steps are sealed.
    pub(crate) fn run_steps<'a>(
        &'a self,
        steps: &'a [WorkflowStep],
        ctx: &'a mut ExecutionContext,
        scope: &'a RunScope,
        logs: &'a mut Vec<ExecutionStepLog>,
    ) -> BoxFuture<'a, ListOutcome> {
        Box::pin(async move {
            let mut last_output = Value::Null;

            for step in steps {
                let is_resumed_human = matches!(step.config, StepConfig::Human(_))
                    && scope.resume_for(&step.id).is_some();

                if !is_resumed_human {
                    if let Some(existing) = scope.existing.get(&step.id) {
                        tracing::debug!(step_id = %step.id, "skipping previously completed step");
                        ctx.set_step_output(&step.id, existing.clone());
                        last_output = existing.clone();
                        continue;
                    }
                }

                let outcome = self.run_step(step, ctx, scope, logs).await;
                if outcome.halts() {
                    return ListOutcome {
                        output: last_output,
                        ..outcome
                    };
                }
                ctx.set_step_output(&step.id, outcome.output.clone());
                last_output = outcome.output;
            }

            ListOutcome::success(last_output)
        })
    }

    /// Run one step and seal its log.
    async fn run_step(
        &self,
        step: &WorkflowStep,
        ctx: &mut ExecutionContext,
        scope: &RunScope,
        logs: &mut Vec<ExecutionStepLog>,
    ) -> ListOutcome {
        let started_at = Utc::now();
        let started = Instant::now();
        let input = self.step_input(step, ctx);

        tracing::debug!(
            step_id = %step.id,
            step_type = %step.step_type(),
            iteration = ?scope.iteration_index,
            "running step"
        );

        let result = match &step.config {
            StepConfig::Agent(config) => self.run_agent(config, ctx, scope).await.map(ListOutcome::success),
            StepConfig::Tool(config) => self
                .run_tool(config, input.clone(), ctx, scope)
                .await
                .map(ListOutcome::success),
            StepConfig::Workflow(config) => {
                self.run_sub_workflow(config, input.clone(), ctx, scope, logs).await
            }
            StepConfig::Branch(config) => Ok(self.run_branch(config, ctx, scope, logs).await),
            StepConfig::Parallel(config) => Ok(self.run_parallel(config, ctx, scope, logs).await),
            StepConfig::Foreach(config) => self.run_foreach(step, config, ctx, scope, logs).await,
            StepConfig::Human(config) => Ok(self.run_human(step, config, ctx, scope)),
            StepConfig::Delay(config) => self.run_delay(config, ctx).await.map(ListOutcome::success),
            StepConfig::Transform => Ok(ListOutcome::success(input.clone())),
        };

        let outcome = result.unwrap_or_else(|e| ListOutcome::failed(Value::Null, e.to_string()));
        let status = outcome.step_status();
        let output = match status {
            StepStatus::Completed => Some(outcome.output.clone()),
            _ if outcome.output.is_null() => None,
            _ => Some(outcome.output.clone()),
        };

        let log = ExecutionStepLog {
            step_id: step.id.clone(),
            step_type: step.step_type(),
            step_name: step.name.clone(),
            status,
            input,
            output,
            error: outcome.error.clone(),
            started_at,
            completed_at: Utc::now(),
            duration_ms: started.elapsed().as_millis() as u64,
            iteration_index: scope.iteration_index,
        };

        match status {
            StepStatus::Failed => tracing::debug!(
                step_id = %step.id,
                error = log.error.as_deref().unwrap_or_default(),
                "step failed"
            ),
            _ => tracing::debug!(
                step_id = %step.id,
                status = %status,
                duration_ms = log.duration_ms,
                "step finished"
            ),
        }

        if let Some(sink) = &scope.sink {
            sink.on_step_event(&log);
        }
        logs.push(log);
        outcome
    }

    /// The input a step actually receives.
    ///
    /// `inputMapping` wins when present. Otherwise tools fall back to their
    /// resolved `parameters` and nested workflows to their resolved `input`,
    /// and every other step receives the context input.
    fn step_input(&self, step: &WorkflowStep, ctx: &ExecutionContext) -> Value {
        if step.input_mapping.is_none() {
            match &step.config {
                StepConfig::Tool(ToolConfig {
                    parameters: Some(parameters),
                    ..
                }) => return resolve_template_value(parameters, ctx),
                StepConfig::Workflow(SubWorkflowConfig {
                    input: Some(input), ..
                }) => return resolve_template_value(input, ctx),
                _ => {}
            }
        }
        resolve_input_mapping(step.input_mapping.as_ref(), ctx)
    }

    // -- Agent: resolve slug and prompt, generate, shape the output --

    async fn run_agent(
        &self,
        config: &AgentConfig,
        ctx: &ExecutionContext,
        scope: &RunScope,
    ) -> Result<Value, StepError> {
        let slug = resolve_identifier(&config.agent_slug, ctx, "agentSlug")?;
        let agents = self.agents.as_ref().ok_or_else(|| {
            StepError::Configuration("no agent provider configured".to_string())
        })?;
        let prompt = stringify_value(&resolve_template(&config.prompt_template, ctx));
        let options = GenerateOptions {
            max_steps: config.max_steps.or(self.config.default_agent_max_steps),
        };

        let span = tracing::info_span!(
            "gen_ai.generate",
            gen_ai.agent.slug = %slug,
            gen_ai.request.max_steps = ?options.max_steps,
            run_id = %scope.run_id,
        );

        let response = async {
            let handle = agents.resolve_boxed(&slug, &scope.request).await?;
            handle.generate_boxed(&prompt, &options).await
        }
        .instrument(span)
        .await?;

        Ok(match config.output_format {
            OutputFormat::Json => extract_json_object(&response.text),
            OutputFormat::Text => json!({
                "text": response.text,
                "toolCalls": response.tool_calls,
            }),
        })
    }

    // -- Tool: tenant-scoped handler lookup, then invoke --

    async fn run_tool(
        &self,
        config: &ToolConfig,
        input: Value,
        ctx: &ExecutionContext,
        scope: &RunScope,
    ) -> Result<Value, StepError> {
        let tool_id = resolve_identifier(&config.tool_id, ctx, "toolId")?;
        let tools = self.tools.as_ref().ok_or_else(|| {
            StepError::Configuration("no tool provider configured".to_string())
        })?;

        let ids = vec![tool_id.clone()];
        let handlers = tools
            .executable_tools_boxed(&ids, scope.request.tenant_id.as_deref())
            .await?;
        let handler = handlers.get(&tool_id).ok_or_else(|| CapabilityError::NotFound {
            kind: "tool",
            id: tool_id.clone(),
        })?;

        tracing::debug!(tool_id = %tool_id, tenant = ?scope.request.tenant_id, "invoking tool");
        Ok(handler.call_boxed(input).await?)
    }

    // -- Workflow: look up the nested definition and run it one level deeper --

    async fn run_sub_workflow(
        &self,
        config: &SubWorkflowConfig,
        input: Value,
        ctx: &ExecutionContext,
        scope: &RunScope,
        logs: &mut Vec<ExecutionStepLog>,
    ) -> Result<ListOutcome, StepError> {
        let workflow_id = resolve_identifier(&config.workflow_id, ctx, "workflowId")?;

        let stored = match &self.repository {
            Some(repository) => repository.find_definition_boxed(&workflow_id).await?,
            None => None,
        };
        let definition = match stored {
            Some(definition) => Arc::new(definition),
            None => self
                .registered
                .get(&workflow_id)
                .cloned()
                .ok_or_else(|| CapabilityError::NotFound {
                    kind: "workflow",
                    id: workflow_id.clone(),
                })?,
        };

        tracing::debug!(workflow_id = %workflow_id, depth = scope.depth + 1, "running nested workflow");
        let nested = self
            .run_definition(definition, ExecutionContext::new(input), scope.nested())
            .await;

        logs.extend(nested.steps);
        Ok(ListOutcome {
            status: nested.status,
            output: nested.output,
            error: nested.error,
            suspended: nested.suspended,
        })
    }

    // -- Branch: first matching candidate, else the default list --

    async fn run_branch(
        &self,
        config: &BranchConfig,
        ctx: &ExecutionContext,
        scope: &RunScope,
        logs: &mut Vec<ExecutionStepLog>,
    ) -> ListOutcome {
        let selected = config
            .branches
            .iter()
            .enumerate()
            .find(|(_, candidate)| self.conditions.evaluate_bool(&candidate.condition, ctx))
            .map(|(i, candidate)| {
                let id = candidate.id.clone().unwrap_or_else(|| format!("branch-{i}"));
                (id, candidate.steps.as_slice())
            });

        let (branch_id, steps) = selected.unwrap_or_else(|| {
            (
                "default".to_string(),
                config.default_branch.as_deref().unwrap_or_default(),
            )
        });
        tracing::debug!(branch_id = %branch_id, "branch selected");

        let mut fork = ctx.fork();
        let outcome = self.run_steps(steps, &mut fork, scope, logs).await;
        ListOutcome {
            output: json!({ "branchId": branch_id, "result": outcome.output }),
            ..outcome
        }
    }

    // -- Parallel: every branch on its own task and fork, joined in order --

    async fn run_parallel(
        &self,
        config: &ParallelConfig,
        ctx: &ExecutionContext,
        scope: &RunScope,
        logs: &mut Vec<ExecutionStepLog>,
    ) -> ListOutcome {
        let mut set = JoinSet::new();
        for (index, branch) in config.branches.iter().enumerate() {
            let runner = self.clone();
            let scope = scope.clone();
            let mut fork = ctx.fork();
            let steps = branch.steps.clone();
            set.spawn(async move {
                let mut branch_logs = Vec::new();
                let outcome = runner.run_steps(&steps, &mut fork, &scope, &mut branch_logs).await;
                (index, outcome, branch_logs)
            });
        }

        let mut results: Vec<Option<(ListOutcome, Vec<ExecutionStepLog>)>> =
            (0..config.branches.len()).map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, outcome, branch_logs)) => results[index] = Some((outcome, branch_logs)),
                Err(e) => tracing::warn!(error = %e, "parallel branch task did not complete"),
            }
        }

        let mut outcomes = Vec::with_capacity(results.len());
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Some((outcome, branch_logs)) => {
                    logs.extend(branch_logs);
                    outcomes.push(outcome);
                }
                None => {
                    let id = config.branches[index]
                        .id
                        .clone()
                        .unwrap_or_else(|| format!("branch-{index}"));
                    outcomes.push(ListOutcome::failed(
                        Value::Null,
                        format!("parallel branch '{id}' panicked"),
                    ));
                }
            }
        }
        join_outcomes(outcomes)
    }

    // -- Foreach: bounded worker pool over the collection --

    async fn run_foreach(
        &self,
        step: &WorkflowStep,
        config: &ForeachConfig,
        ctx: &ExecutionContext,
        scope: &RunScope,
        logs: &mut Vec<ExecutionStepLog>,
    ) -> Result<ListOutcome, StepError> {
        let collection = if is_template(&config.collection_path) {
            resolve_template(&config.collection_path, ctx)
        } else {
            ctx.lookup(&config.collection_path).unwrap_or(Value::Null)
        };
        let Value::Array(items) = collection else {
            return Err(StepError::Configuration(format!(
                "foreach step '{}': collectionPath '{}' did not resolve to an array",
                step.id, config.collection_path
            )));
        };

        let total = items.len();
        let concurrency = config
            .concurrency
            .unwrap_or(self.config.default_foreach_concurrency)
            .max(1);
        tracing::debug!(step_id = %step.id, total, concurrency, "starting foreach");

        let semaphore = Semaphore::new(concurrency);
        let mut tasks = FuturesUnordered::new();
        for (index, item) in items.into_iter().enumerate() {
            let semaphore = &semaphore;

            // The context is forked only once a permit is held.
            tasks.push(async move {
                let mut iteration_logs = Vec::new();
                let outcome = match semaphore.acquire().await {
                    Ok(_permit) => {
                        let mut fork = ctx.fork();
                        fork.set_variable(config.item_var(), item);
                        fork.set_variable("index", json!(index));
                        let iteration_scope = scope.for_iteration(index);
                        self.run_steps(&config.steps, &mut fork, &iteration_scope, &mut iteration_logs)
                            .await
                    }
                    Err(_) => ListOutcome::failed(Value::Null, "foreach worker pool closed"),
                };
                (index, outcome, iteration_logs)
            });
        }

        let mut outcomes: Vec<Option<ListOutcome>> = (0..total).map(|_| None).collect();
        while let Some((index, outcome, iteration_logs)) = tasks.next().await {
            logs.extend(iteration_logs);
            outcomes[index] = Some(outcome);
        }

        Ok(join_outcomes(
            outcomes
                .into_iter()
                .map(|o| o.unwrap_or_else(|| ListOutcome::success(Value::Null)))
                .collect(),
        ))
    }

    // -- Human: complete from resume data, otherwise suspend --

    fn run_human(
        &self,
        step: &WorkflowStep,
        config: &HumanConfig,
        ctx: &ExecutionContext,
        scope: &RunScope,
    ) -> ListOutcome {
        if let Some(resume) = scope.resume_for(&step.id) {
            tracing::debug!(step_id = %step.id, "human step resumed");
            return ListOutcome::success(resume.data.clone());
        }

        let prompt = config
            .prompt
            .as_deref()
            .map(|p| resolve_template(p, ctx))
            .unwrap_or(Value::Null);
        let data = json!({
            "prompt": prompt,
            "formSchema": config.form_schema.clone().unwrap_or(Value::Null),
            "timeout": config.timeout.clone().unwrap_or(Value::Null),
        });

        tracing::info!(step_id = %step.id, run_id = %scope.run_id, "workflow suspended for human input");
        ListOutcome::suspended(
            Value::Null,
            Suspension {
                step_id: step.id.clone(),
                data,
            },
        )
    }

    // -- Delay: best-effort sleep, capped by config --

    async fn run_delay(
        &self,
        config: &DelayConfig,
        ctx: &ExecutionContext,
    ) -> Result<Value, StepError> {
        let requested = delay_millis(&resolve_template_value(&config.delay_ms, ctx)).ok_or_else(
            || {
                StepError::Configuration(format!(
                    "delayMs must be a non-negative number, got {}",
                    config.delay_ms
                ))
            },
        )?;
        let delay_ms = requested.min(self.config.max_delay_ms);
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        Ok(json!({ "delayedMs": delay_ms }))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Resolve a templated identifier that must end up a non-empty string.
fn resolve_identifier(
    template: &str,
    ctx: &ExecutionContext,
    field: &str,
) -> Result<String, StepError> {
    match resolve_template(template, ctx) {
        Value::String(s) if !s.trim().is_empty() => Ok(s),
        other => Err(StepError::Configuration(format!(
            "{field} must resolve to a non-empty string, got {other}"
        ))),
    }
}

/// Parse the span between the first `{` and the last `}` as JSON, falling
/// back to `{raw: text}`.
pub fn extract_json_object(text: &str) -> Value {
    let parsed = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => {
            serde_json::from_str::<Value>(&text[start..=end]).ok()
        }
        _ => None,
    };
    parsed.unwrap_or_else(|| json!({ "raw": text }))
}

fn delay_millis(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn test_context() -> ExecutionContext {
        ExecutionContext::new(json!({ "agent": "writer", "blank": "  ", "wait": "25" }))
    }

    #[test]
    fn extract_json_object_takes_outer_braces() {
        let text = "Sure! Here you go:\n{\"title\": \"Hi\", \"tags\": {\"a\": 1}}\nThanks.";
        assert_eq!(
            extract_json_object(text),
            json!({ "title": "Hi", "tags": { "a": 1 } })
        );
    }

    #[test]
    fn extract_json_object_falls_back_to_raw() {
        assert_eq!(extract_json_object("no json"), json!({ "raw": "no json" }));
        assert_eq!(extract_json_object("} {"), json!({ "raw": "} {" }));
        assert_eq!(
            extract_json_object("{not: valid}"),
            json!({ "raw": "{not: valid}" })
        );
    }

    #[test]
    fn identifiers_must_resolve_to_non_empty_strings() {
        let ctx = test_context();
        assert_eq!(
            resolve_identifier("{{input.agent}}", &ctx, "agentSlug").unwrap(),
            "writer"
        );
        assert_eq!(resolve_identifier("fixed", &ctx, "toolId").unwrap(), "fixed");

        let err = resolve_identifier("{{input.missing}}", &ctx, "agentSlug").unwrap_err();
        assert!(matches!(err, StepError::Configuration(ref m) if m.starts_with("agentSlug")));
        assert!(resolve_identifier("{{input.blank}}", &ctx, "toolId").is_err());
        assert!(resolve_identifier("", &ctx, "workflowId").is_err());
    }

    #[test]
    fn delay_accepts_numbers_and_numeric_strings() {
        let ctx = test_context();
        assert_eq!(delay_millis(&json!(10)), Some(10));
        assert_eq!(delay_millis(&json!(2.5)), Some(2));
        assert_eq!(
            delay_millis(&resolve_template_value(&json!("{{input.wait}}"), &ctx)),
            Some(25)
        );
        assert_eq!(delay_millis(&json!(-1)), None);
        assert_eq!(delay_millis(&json!("soon")), None);
        assert_eq!(delay_millis(&json!(null)), None);
    }

    #[test]
    fn nested_scope_increments_depth_and_keeps_iteration() {
        let scope = RunScope {
            run_id: Uuid::now_v7(),
            depth: 2,
            resume: Some(Arc::new(ResumeInput {
                step_id: "approve".into(),
                data: json!(true),
            })),
            existing: Arc::new(HashMap::new()),
            request: Arc::new(RequestContext::new()),
            sink: None,
            iteration_index: Some(3),
        };
        let nested = scope.nested();
        assert_eq!(nested.depth, 3);
        assert_ne!(nested.run_id, scope.run_id);
        assert_eq!(nested.iteration_index, Some(3));
        assert!(nested.resume_for("approve").is_some());
        assert!(nested.resume_for("other").is_none());
        assert_eq!(scope.for_iteration(0).iteration_index, Some(0));
    }

    #[tokio::test]
    async fn foreach_forks_context_only_for_running_iterations() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        use crate::capability::tool::{tool_fn, ToolRegistry};

        let ctx = ExecutionContext::new(json!({ "items": (0..40).collect::<Vec<u32>>() }));
        let input = Arc::clone(ctx.shared_input());
        let peak = Arc::new(AtomicUsize::new(0));
        let tool_input = Arc::clone(&input);
        let watch = {
            let peak = peak.clone();
            tool_fn(move |_args| {
                let live = Arc::strong_count(&tool_input);
                let peak = peak.clone();
                async move {
                    peak.fetch_max(live, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    Ok::<Value, CapabilityError>(Value::Null)
                }
            })
        };
        let runner = StepRunner {
            config: Arc::new(EngineConfig::default()),
            agents: None,
            tools: Some(Arc::new(ToolRegistry::new().register("watch", watch))),
            repository: None,
            registered: Arc::new(HashMap::new()),
            conditions: ConditionEvaluator::new(),
        };
        let def: WorkflowDefinition = serde_json::from_value(json!({
            "steps": [{
                "id": "each",
                "type": "foreach",
                "config": {
                    "collectionPath": "input.items",
                    "concurrency": 2,
                    "steps": [{ "id": "watch", "type": "tool", "config": { "toolId": "watch" } }]
                }
            }]
        }))
        .unwrap();
        let step = &def.steps[0];
        let StepConfig::Foreach(config) = &step.config else {
            panic!("expected a foreach step");
        };
        let scope = RunScope {
            run_id: Uuid::now_v7(),
            depth: 0,
            resume: None,
            existing: Arc::new(HashMap::new()),
            request: Arc::new(RequestContext::new()),
            sink: None,
            iteration_index: None,
        };

        let mut logs = Vec::new();
        let outcome = runner
            .run_foreach(step, config, &ctx, &scope, &mut logs)
            .await
            .unwrap();

        assert!(!outcome.halts());
        assert_eq!(logs.len(), 40);
        // ctx, the test handle and the tool's handle, plus one per live fork.
        assert!(peak.load(Ordering::SeqCst) <= 3 + 2);
    }
}
