//! Flowline workflow engine.
//!
//! - `workflow` -- path/template resolution, conditions, the step dispatcher
//!   and the run driver
//! - `capability` -- traits for the agents, tools, workflow repositories and
//!   step event sinks the engine calls into, plus in-memory implementations

pub mod capability;
pub mod workflow;

pub use capability::request_context::RequestContext;
pub use workflow::executor::{ExecuteOptions, WorkflowEngine, WorkflowEngineBuilder};
