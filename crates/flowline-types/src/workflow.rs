//! Workflow definition types for Flowline.
//!
//! A `WorkflowDefinition` is an ordered list of typed steps. Definitions are
//! stored as serialized data (YAML or JSON), so the wire shape of every step
//! config is fixed:
//!
//! ```yaml
//! steps:
//!   - id: fetch
//!     type: tool
//!     inputMapping:
//!       target: "{{input.url}}"
//!     config:
//!       toolId: fetch
//! ```
//!
//! The `type` tag sits next to `config` rather than inside it, so steps go
//! through [`RawStep`] on the way in and out and each variant's required
//! fields are checked at deserialization time.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Workflow Definition
// ---------------------------------------------------------------------------

/// A declarative workflow: an ordered list of steps plus lookup metadata.
///
/// Immutable once handed to a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Stable identifier used by repositories (`findDefinition(idOrSlug)`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Human-readable name, also accepted as a lookup slug.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Top-level step list, executed in order.
    pub steps: Vec<WorkflowStep>,
}

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

/// A single node in a workflow.
///
/// `id` must be unique among its siblings: it is the key under which the
/// step's output is stored in the execution context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawStep", into = "RawStep")]
pub struct WorkflowStep {
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    /// Template tree resolved against the context to build the step input.
    /// When absent the step receives the context's current input.
    pub input_mapping: Option<Value>,
    /// Variant-specific configuration, keyed by step type.
    pub config: StepConfig,
}

impl WorkflowStep {
    /// The step's type tag.
    pub fn step_type(&self) -> StepType {
        self.config.step_type()
    }

    /// Display label: the name when present, otherwise the id.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// The kind of step in a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    Agent,
    Tool,
    Workflow,
    Branch,
    Parallel,
    Foreach,
    Human,
    Transform,
    Delay,
}

impl StepType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepType::Agent => "agent",
            StepType::Tool => "tool",
            StepType::Workflow => "workflow",
            StepType::Branch => "branch",
            StepType::Parallel => "parallel",
            StepType::Foreach => "foreach",
            StepType::Human => "human",
            StepType::Transform => "transform",
            StepType::Delay => "delay",
        }
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Step-specific configuration payload.
#[derive(Debug, Clone, PartialEq)]
pub enum StepConfig {
    /// Invoke a language-model agent with a rendered prompt.
    Agent(AgentConfig),
    /// Call a tool handler from the tool provider.
    Tool(ToolConfig),
    /// Run another stored workflow as a nested run.
    Workflow(SubWorkflowConfig),
    /// Run the first branch whose condition holds.
    Branch(BranchConfig),
    /// Run every branch concurrently and join.
    Parallel(ParallelConfig),
    /// Run a step list once per collection item with bounded concurrency.
    Foreach(ForeachConfig),
    /// Suspend until a human supplies resume data.
    Human(HumanConfig),
    /// Pass the resolved input through as output.
    Transform,
    /// Sleep for a fixed duration.
    Delay(DelayConfig),
}

impl StepConfig {
    pub fn step_type(&self) -> StepType {
        match self {
            StepConfig::Agent(_) => StepType::Agent,
            StepConfig::Tool(_) => StepType::Tool,
            StepConfig::Workflow(_) => StepType::Workflow,
            StepConfig::Branch(_) => StepType::Branch,
            StepConfig::Parallel(_) => StepType::Parallel,
            StepConfig::Foreach(_) => StepType::Foreach,
            StepConfig::Human(_) => StepType::Human,
            StepConfig::Transform => StepType::Transform,
            StepConfig::Delay(_) => StepType::Delay,
        }
    }

    /// Nested step lists owned by this config, in declaration order.
    ///
    /// Used by validation and tree rendering; leaf steps return nothing.
    pub fn child_lists(&self) -> Vec<&[WorkflowStep]> {
        match self {
            StepConfig::Branch(branch) => {
                let mut lists: Vec<&[WorkflowStep]> =
                    branch.branches.iter().map(|b| b.steps.as_slice()).collect();
                if let Some(default) = &branch.default_branch {
                    lists.push(default.as_slice());
                }
                lists
            }
            StepConfig::Parallel(parallel) => {
                parallel.branches.iter().map(|b| b.steps.as_slice()).collect()
            }
            StepConfig::Foreach(foreach) => vec![foreach.steps.as_slice()],
            _ => Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Variant configs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    /// Agent slug; may be a template.
    pub agent_slug: String,
    pub prompt_template: String,
    #[serde(default)]
    pub output_format: OutputFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_steps: Option<u32>,
}

/// How an agent step interprets the response text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolConfig {
    /// Tool id; may be a template.
    pub tool_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubWorkflowConfig {
    /// Id or slug of the nested workflow; may be a template.
    pub workflow_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchConfig {
    pub branches: Vec<ConditionalBranch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_branch: Option<Vec<WorkflowStep>>,
}

/// One candidate of a `branch` step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalBranch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Boolean condition over `input`, `steps` and `variables`.
    pub condition: String,
    pub steps: Vec<WorkflowStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelConfig {
    pub branches: Vec<ParallelBranch>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelBranch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub steps: Vec<WorkflowStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeachConfig {
    /// Path (`input.items`) or single template (`{{steps.fetch.items}}`)
    /// that must resolve to an array.
    pub collection_path: String,
    /// Variable name bound to the current item (default `item`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_var: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
    pub steps: Vec<WorkflowStep>,
}

impl ForeachConfig {
    pub fn item_var(&self) -> &str {
        self.item_var.as_deref().unwrap_or("item")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HumanConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_schema: Option<Value>,
    /// Advisory only; surfaced in the suspension payload, never enforced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelayConfig {
    /// Milliseconds as a number, or a template resolving to one.
    pub delay_ms: Value,
}

// ---------------------------------------------------------------------------
// Wire conversion
// ---------------------------------------------------------------------------

/// Serialized form of a step: `type` and an untyped `config` side by side.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStep {
    pub id: String,
    #[serde(rename = "type")]
    pub step_type: StepType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_mapping: Option<Value>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub config: Value,
}

/// A step's `config` did not match the shape required by its `type`.
#[derive(Debug, thiserror::Error)]
#[error("invalid config for {step_type} step '{step_id}': {source}")]
pub struct StepConfigError {
    pub step_id: String,
    pub step_type: StepType,
    #[source]
    pub source: serde_json::Error,
}

impl TryFrom<RawStep> for WorkflowStep {
    type Error = StepConfigError;

    fn try_from(raw: RawStep) -> Result<Self, Self::Error> {
        // Every field of a human config is optional, so `config` may be omitted.
        let payload = if raw.config.is_null() {
            Value::Object(Default::default())
        } else {
            raw.config
        };

        let wrap = |source| StepConfigError {
            step_id: raw.id.clone(),
            step_type: raw.step_type,
            source,
        };

        let config = match raw.step_type {
            StepType::Agent => StepConfig::Agent(serde_json::from_value(payload).map_err(wrap)?),
            StepType::Tool => StepConfig::Tool(serde_json::from_value(payload).map_err(wrap)?),
            StepType::Workflow => {
                StepConfig::Workflow(serde_json::from_value(payload).map_err(wrap)?)
            }
            StepType::Branch => StepConfig::Branch(serde_json::from_value(payload).map_err(wrap)?),
            StepType::Parallel => {
                StepConfig::Parallel(serde_json::from_value(payload).map_err(wrap)?)
            }
            StepType::Foreach => {
                StepConfig::Foreach(serde_json::from_value(payload).map_err(wrap)?)
            }
            StepType::Human => StepConfig::Human(serde_json::from_value(payload).map_err(wrap)?),
            StepType::Transform => StepConfig::Transform,
            StepType::Delay => StepConfig::Delay(serde_json::from_value(payload).map_err(wrap)?),
        };

        Ok(WorkflowStep {
            id: raw.id,
            name: raw.name,
            description: raw.description,
            input_mapping: raw.input_mapping,
            config,
        })
    }
}

impl From<WorkflowStep> for RawStep {
    fn from(step: WorkflowStep) -> Self {
        let step_type = step.step_type();
        let config = match step.config {
            StepConfig::Agent(c) => serde_json::to_value(c),
            StepConfig::Tool(c) => serde_json::to_value(c),
            StepConfig::Workflow(c) => serde_json::to_value(c),
            StepConfig::Branch(c) => serde_json::to_value(c),
            StepConfig::Parallel(c) => serde_json::to_value(c),
            StepConfig::Foreach(c) => serde_json::to_value(c),
            StepConfig::Human(c) => serde_json::to_value(c),
            StepConfig::Transform => Ok(Value::Null),
            StepConfig::Delay(c) => serde_json::to_value(c),
        }
        // Config structs only hold strings, numbers and JSON values.
        .unwrap_or(Value::Null);

        RawStep {
            id: step.id,
            step_type,
            name: step.name,
            description: step.description,
            input_mapping: step.input_mapping,
            config,
        }
    }
}
