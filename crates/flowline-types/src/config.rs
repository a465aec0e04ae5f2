//! Configuration types.
//!
//! `FlowlineConfig` mirrors `flowline.toml`. `EngineConfig` is its `[engine]`
//! table. Every field has a default so a missing or partial file still
//! yields a usable engine.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level host configuration (`flowline.toml`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowlineConfig {
    #[serde(default)]
    pub engine: EngineConfig,

    /// Directory searched for nested workflow definitions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflows_dir: Option<PathBuf>,

    #[serde(default)]
    pub anthropic: AnthropicSettings,

    /// Agent profiles addressable by `agentSlug`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub agents: Vec<AgentProfile>,
}

impl FlowlineConfig {
    pub fn agent(&self, slug: &str) -> Option<&AgentProfile> {
        self.agents.iter().find(|a| a.slug == slug)
    }
}

/// `[anthropic]` table: connection settings for the Messages API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnthropicSettings {
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub default_model: String,
}

fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

fn default_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

impl Default for AnthropicSettings {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            default_model: default_model(),
        }
    }
}

/// One `[[agents]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

/// Limits and defaults applied by the run driver and step dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Deepest permitted nested-workflow level. The top-level run is depth 0.
    #[serde(default = "default_max_nesting_depth")]
    pub max_nesting_depth: u32,

    /// Worker count for `foreach` steps that omit `concurrency`.
    #[serde(default = "default_foreach_concurrency")]
    pub default_foreach_concurrency: usize,

    /// Upper bound applied to `delay` steps.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// `maxSteps` passed to agents when a step does not set one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_agent_max_steps: Option<u32>,
}

/// Default nesting limit for nested workflow runs.
pub const MAX_NESTING_DEPTH: u32 = 5;

fn default_max_nesting_depth() -> u32 {
    MAX_NESTING_DEPTH
}

fn default_foreach_concurrency() -> usize {
    5
}

fn default_max_delay_ms() -> u64 {
    300_000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_nesting_depth: default_max_nesting_depth(),
            default_foreach_concurrency: default_foreach_concurrency(),
            max_delay_ms: default_max_delay_ms(),
            default_agent_max_steps: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_default_values() {
        let config = EngineConfig::default();
        assert_eq!(config.max_nesting_depth, 5);
        assert_eq!(config.default_foreach_concurrency, 5);
        assert_eq!(config.max_delay_ms, 300_000);
        assert!(config.default_agent_max_steps.is_none());
    }

    #[test]
    fn test_engine_config_partial_toml_fills_defaults() {
        let config: EngineConfig = toml::from_str("max_nesting_depth = 3").unwrap();
        assert_eq!(config.max_nesting_depth, 3);
        assert_eq!(config.default_foreach_concurrency, 5);
    }

    #[test]
    fn test_flowline_config_full_toml() {
        let config: FlowlineConfig = toml::from_str(
            r#"
workflows_dir = "/srv/workflows"

[engine]
default_foreach_concurrency = 2

[anthropic]
default_model = "claude-3-5-haiku-latest"

[[agents]]
slug = "writer"
system_prompt = "You write release notes."
max_tokens = 2048

[[agents]]
slug = "planner"
model = "claude-opus-4-20250514"
temperature = 0.2
"#,
        )
        .unwrap();

        assert_eq!(config.engine.default_foreach_concurrency, 2);
        assert_eq!(config.engine.max_nesting_depth, 5);
        assert_eq!(config.workflows_dir, Some(PathBuf::from("/srv/workflows")));
        assert_eq!(config.anthropic.api_key_env, "ANTHROPIC_API_KEY");
        assert_eq!(config.anthropic.default_model, "claude-3-5-haiku-latest");
        assert_eq!(config.agents.len(), 2);
        assert_eq!(config.agent("writer").and_then(|a| a.max_tokens), Some(2048));
        assert!(config.agent("ghost").is_none());
    }

    #[test]
    fn test_engine_config_empty_toml_is_default() {
        let config: EngineConfig = toml::from_str("").unwrap();
        assert_eq!(config, EngineConfig::default());

        let config: FlowlineConfig = toml::from_str("").unwrap();
        assert_eq!(config, FlowlineConfig::default());
    }
}
