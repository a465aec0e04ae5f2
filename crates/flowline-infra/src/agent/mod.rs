//! Agent providers backed by hosted LLM APIs.

pub mod anthropic;
mod types;

pub use anthropic::{AnthropicAgent, AnthropicAgentProvider};
