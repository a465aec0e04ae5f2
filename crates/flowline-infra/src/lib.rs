//! Host adapters for the Flowline engine.
//!
//! - `config` -- `flowline.toml` loading and the home directory
//! - `repository` -- filesystem-backed `WorkflowRepository`
//! - `agent` -- Anthropic Messages API `AgentProvider`
//! - `tool` -- built-in tools (`http_request`)
//! - `event_sink` -- JSONL step event persistence for inspection and resume

pub mod agent;
pub mod config;
pub mod event_sink;
pub mod repository;
pub mod tool;

/// Errors raised while wiring host adapters.
#[derive(Debug, thiserror::Error)]
pub enum InfraError {
    #[error("missing API key: environment variable {0} is not set")]
    MissingApiKey(String),

    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid event log {path} at line {line}: {message}")]
    EventLog {
        path: String,
        line: usize,
        message: String,
    },
}
