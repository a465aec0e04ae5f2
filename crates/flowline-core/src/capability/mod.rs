//! Capabilities the engine calls into but does not implement.
//!
//! Each provider follows the same two-trait pattern:
//! 1. An ergonomic trait with `impl Future` returns (`AgentProvider`,
//!    `ToolHandler`, ...) that hosts implement.
//! 2. An object-safe `*Dyn` twin with boxed futures, blanket-implemented for
//!    every implementor, which the engine stores behind `Arc<dyn ...>`.

pub mod agent;
pub mod event;
pub mod repository;
pub mod request_context;
pub mod tool;

use std::future::Future;
use std::pin::Pin;

/// Boxed, sendable future used by the object-safe provider traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors raised by capability providers.
///
/// The dispatcher records the `Display` form as the failed step's `error`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CapabilityError {
    #[error("agent error: {0}")]
    Agent(String),

    #[error("tool error: {0}")]
    Tool(String),

    #[error("workflow repository error: {0}")]
    Repository(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("capability unavailable: {0}")]
    Unavailable(String),
}
