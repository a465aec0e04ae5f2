//! Shared domain types for Flowline.
//!
//! Workflow definitions (the serialized form hosts store), execution results
//! and step logs (what the engine hands back), and engine configuration.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod config;
pub mod execution;
pub mod workflow;
