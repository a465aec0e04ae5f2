//! Run driver: the public entry point of the engine.
//!
//! `WorkflowEngine` is built once with its capability providers and then
//! executes definitions. Each run:
//!
//! 1. Rejects runs deeper than `max_nesting_depth` without running any step.
//! 2. Builds an `ExecutionContext` from the input, seeded with `existing_steps`.
//! 3. Runs the top-level step list through the `StepRunner`.
//! 4. Reports every sealed step log to the optional event sink.
//! 5. Returns an `ExecutionResult`; failures never surface as `Err`.

use std::collections::HashMap;
use std::sync::Arc;

use flowline_types::config::EngineConfig;
use flowline_types::execution::{ExecutionResult, ResumeInput};
use flowline_types::workflow::WorkflowDefinition;
use serde_json::Value;
use tracing::Instrument;
use uuid::Uuid;

use crate::capability::agent::AgentProvider;
use crate::capability::event::{SharedStepEventSink, StepEventSink};
use crate::capability::repository::WorkflowRepository;
use crate::capability::request_context::RequestContext;
use crate::capability::tool::ToolProvider;
use crate::capability::BoxFuture;

use super::context::ExecutionContext;
use super::expression::ConditionEvaluator;
use super::step_runner::{RunScope, StepRunner};

/// Error reported when a run exceeds the nesting limit.
pub const MAX_DEPTH_ERROR: &str = "maximum nesting depth exceeded";

// ---------------------------------------------------------------------------
// ExecuteOptions
// ---------------------------------------------------------------------------

/// Per-invocation options for [`WorkflowEngine::execute`].
#[derive(Clone, Default)]
pub struct ExecuteOptions {
    /// Completes the human step that suspended an earlier attempt.
    pub resume: Option<ResumeInput>,
    /// Outputs of steps completed by an earlier attempt; these are skipped.
    pub existing_steps: HashMap<String, Value>,
    pub request_context: Option<RequestContext>,
    /// Nesting depth of this run. Top-level runs use 0.
    pub depth: u32,
    pub on_step_event: Option<SharedStepEventSink>,
}

impl ExecuteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resume(mut self, resume: ResumeInput) -> Self {
        self.resume = Some(resume);
        self
    }

    pub fn with_existing_steps(mut self, existing_steps: HashMap<String, Value>) -> Self {
        self.existing_steps = existing_steps;
        self
    }

    pub fn with_request_context(mut self, request_context: RequestContext) -> Self {
        self.request_context = Some(request_context);
        self
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_event_sink(mut self, sink: impl StepEventSink + 'static) -> Self {
        self.on_step_event = Some(Arc::new(sink));
        self
    }

    pub fn with_shared_event_sink(mut self, sink: SharedStepEventSink) -> Self {
        self.on_step_event = Some(sink);
        self
    }
}

// ---------------------------------------------------------------------------
// WorkflowEngine
// ---------------------------------------------------------------------------

/// Workflow engine holding capability providers and limits.
///
/// Cheap to clone; clones share providers.
#[derive(Clone)]
pub struct WorkflowEngine {
    runner: StepRunner,
}

impl WorkflowEngine {
    pub fn builder() -> WorkflowEngineBuilder {
        WorkflowEngineBuilder::default()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.runner.config
    }

    /// Execute `definition` against `input`.
    pub async fn execute(
        &self,
        definition: &WorkflowDefinition,
        input: Value,
        options: ExecuteOptions,
    ) -> ExecutionResult {
        let ExecuteOptions {
            resume,
            existing_steps,
            request_context,
            depth,
            on_step_event,
        } = options;

        let ctx = ExecutionContext::new(input).with_steps(existing_steps.clone());
        let scope = RunScope {
            run_id: Uuid::now_v7(),
            depth,
            resume: resume.map(Arc::new),
            existing: Arc::new(existing_steps),
            request: Arc::new(request_context.unwrap_or_default()),
            sink: on_step_event,
            iteration_index: None,
        };

        let result = self
            .runner
            .run_definition(Arc::new(definition.clone()), ctx, scope)
            .await;

        tracing::info!(
            workflow = definition.id.as_deref().unwrap_or("inline"),
            status = %result.status,
            steps = result.steps.len(),
            error = result.error.as_deref().unwrap_or_default(),
            "workflow run finished"
        );
        result
    }
}

impl StepRunner {
    /// Run a whole definition at `scope.depth`. Also used for nested
    /// `workflow` steps.
    pub(crate) fn run_definition(
        &self,
        definition: Arc<WorkflowDefinition>,
        ctx: ExecutionContext,
        scope: RunScope,
    ) -> BoxFuture<'_, ExecutionResult> {
        Box::pin(async move {
            if scope.depth > self.config.max_nesting_depth {
                tracing::warn!(
                    depth = scope.depth,
                    max = self.config.max_nesting_depth,
                    "workflow nesting depth exceeded"
                );
                return ExecutionResult::failed(MAX_DEPTH_ERROR);
            }

            let span = tracing::info_span!(
                "workflow.run",
                run_id = %scope.run_id,
                depth = scope.depth,
                workflow = definition.id.as_deref().unwrap_or("inline"),
            );

            async move {
                tracing::debug!(steps = definition.steps.len(), "workflow run started");
                let mut ctx = ctx;
                let mut logs = Vec::new();
                let outcome = self
                    .run_steps(&definition.steps, &mut ctx, &scope, &mut logs)
                    .await;

                ExecutionResult {
                    status: outcome.status,
                    output: outcome.output,
                    steps: logs,
                    suspended: outcome.suspended,
                    error: outcome.error,
                }
            }
            .instrument(span)
            .await
        })
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Assembles a [`WorkflowEngine`]. Every provider is optional; steps that
/// need a missing provider fail with a configuration error.
#[derive(Default)]
pub struct WorkflowEngineBuilder {
    config: EngineConfig,
    agents: Option<crate::capability::agent::SharedAgentProvider>,
    tools: Option<crate::capability::tool::SharedToolProvider>,
    repository: Option<crate::capability::repository::SharedWorkflowRepository>,
    registered: HashMap<String, Arc<WorkflowDefinition>>,
}

impl WorkflowEngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn agent_provider(mut self, provider: impl AgentProvider) -> Self {
        self.agents = Some(Arc::new(provider));
        self
    }

    pub fn tool_provider(mut self, provider: impl ToolProvider) -> Self {
        self.tools = Some(Arc::new(provider));
        self
    }

    pub fn workflow_repository(mut self, repository: impl WorkflowRepository) -> Self {
        self.repository = Some(Arc::new(repository));
        self
    }

    /// Register a workflow by id, used when the repository has no match.
    pub fn register_workflow(mut self, id: impl Into<String>, definition: WorkflowDefinition) -> Self {
        self.registered.insert(id.into(), Arc::new(definition));
        self
    }

    pub fn build(self) -> WorkflowEngine {
        WorkflowEngine {
            runner: StepRunner {
                config: Arc::new(self.config),
                agents: self.agents,
                tools: self.tools,
                repository: self.repository,
                registered: Arc::new(self.registered),
                conditions: ConditionEvaluator::new(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
