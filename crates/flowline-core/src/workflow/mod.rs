//! Workflow engine core: resolution, conditions, dispatch and the run driver.
//!
//! - `path` -- dotted/bracket path resolution over JSON values
//! - `template` -- `{{ path }}` interpolation with typed exact matches
//! - `expression` -- tokenizer, parser and evaluator for branch conditions
//! - `context` -- per-run input, step outputs and variables
//! - `definition` -- YAML/JSON parsing, validation, filesystem discovery
//! - `outcome` -- list outcomes, concurrent join rules, resume helpers
//! - `step_runner` -- step type dispatchers for all 9 step types
//! - `executor` -- `WorkflowEngine`, its builder and the run driver

pub mod context;
pub mod definition;
pub mod executor;
pub mod expression;
pub mod outcome;
pub mod path;
pub mod step_runner;
pub mod template;
