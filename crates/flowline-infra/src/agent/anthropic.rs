//! `AnthropicAgentProvider` -- [`AgentProvider`] over the Anthropic Messages
//! API (`/v1/messages`).
//!
//! Agent slugs map to `[[agents]]` profiles from `flowline.toml`; a slug with
//! no profile runs on the default model with no system prompt. Each
//! `generate` call is a single request: `maxSteps` is logged but no tool
//! loop is driven here.
//!
//! The API key is held as a [`SecretString`] and only exposed when building
//! request headers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use flowline_core::capability::agent::{AgentHandle, AgentProvider, AgentResponse, GenerateOptions};
use flowline_core::capability::CapabilityError;
use flowline_core::RequestContext;
use flowline_types::config::{AgentProfile, AnthropicSettings};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;

use super::types::{ContentBlock, MessageParam, MessagesRequest, MessagesResponse};
use crate::InfraError;

const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Connection state shared by the provider and every handle it resolves.
struct Client {
    http: reqwest::Client,
    api_key: SecretString,
    base_url: String,
}

/// Anthropic-backed agent provider.
///
/// Intentionally not `Debug`.
pub struct AnthropicAgentProvider {
    client: Arc<Client>,
    default_model: String,
    profiles: HashMap<String, AgentProfile>,
}

impl AnthropicAgentProvider {
    pub fn new(
        api_key: SecretString,
        settings: &AnthropicSettings,
        profiles: Vec<AgentProfile>,
    ) -> Result<Self, InfraError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()?;

        Ok(Self {
            client: Arc::new(Client {
                http,
                api_key,
                base_url: settings.base_url.trim_end_matches('/').to_string(),
            }),
            default_model: settings.default_model.clone(),
            profiles: profiles.into_iter().map(|p| (p.slug.clone(), p)).collect(),
        })
    }

    /// Build a provider reading the key from `settings.api_key_env`.
    pub fn from_env(
        settings: &AnthropicSettings,
        profiles: Vec<AgentProfile>,
    ) -> Result<Self, InfraError> {
        let key = std::env::var(&settings.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| InfraError::MissingApiKey(settings.api_key_env.clone()))?;
        Self::new(SecretString::from(key), settings, profiles)
    }

    fn agent_for(&self, slug: &str) -> AnthropicAgent {
        let profile = self.profiles.get(slug);
        AnthropicAgent {
            client: self.client.clone(),
            slug: slug.to_string(),
            model: profile
                .and_then(|p| p.model.clone())
                .unwrap_or_else(|| self.default_model.clone()),
            system: profile.and_then(|p| p.system_prompt.clone()),
            max_tokens: profile
                .and_then(|p| p.max_tokens)
                .unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: profile.and_then(|p| p.temperature),
        }
    }
}

impl AgentProvider for AnthropicAgentProvider {
    type Handle = AnthropicAgent;

    async fn resolve(
        &self,
        slug: &str,
        request: &RequestContext,
    ) -> Result<AnthropicAgent, CapabilityError> {
        if !self.profiles.contains_key(slug) {
            tracing::debug!(slug, request_id = %request.request_id, "no agent profile, using default model");
        }
        Ok(self.agent_for(slug))
    }
}

/// One resolved agent profile.
pub struct AnthropicAgent {
    client: Arc<Client>,
    slug: String,
    model: String,
    system: Option<String>,
    max_tokens: u32,
    temperature: Option<f64>,
}

impl AnthropicAgent {
    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(&self, prompt: &str) -> MessagesRequest {
        MessagesRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: vec![MessageParam {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            system: self.system.clone(),
            temperature: self.temperature,
        }
    }
}

impl AgentHandle for AnthropicAgent {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<AgentResponse, CapabilityError> {
        let body = self.request_body(prompt);
        let url = format!("{}/v1/messages", self.client.base_url);
        tracing::debug!(
            slug = %self.slug,
            model = %self.model,
            max_steps = ?options.max_steps,
            "sending anthropic request"
        );

        let response = self
            .client
            .http
            .post(&url)
            .header("x-api-key", self.client.api_key.expose_secret())
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| CapabilityError::Agent(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(CapabilityError::Agent(match status.as_u16() {
                401 => "authentication failed".to_string(),
                429 => "rate limited".to_string(),
                _ => format!("HTTP {status}: {error_body}"),
            }));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| CapabilityError::Agent(format!("failed to parse response: {e}")))?;
        tracing::debug!(slug = %self.slug, stop_reason = ?parsed.stop_reason, "anthropic response received");

        Ok(to_agent_response(parsed))
    }
}

/// Join text blocks; surface `tool_use` blocks as tool calls.
fn to_agent_response(response: MessagesResponse) -> AgentResponse {
    let mut text = String::new();
    let mut tool_calls = Vec::new();
    for block in response.content {
        match block {
            ContentBlock::Text { text: chunk } => text.push_str(&chunk),
            ContentBlock::ToolUse { id, name, input } => {
                tool_calls.push(json!({ "id": id, "name": name, "input": input }));
            }
            ContentBlock::Other => {}
        }
    }
    AgentResponse { text, tool_calls }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> AnthropicAgentProvider {
        let settings = AnthropicSettings {
            base_url: "http://localhost:9/".to_string(),
            ..AnthropicSettings::default()
        };
        let profiles = vec![AgentProfile {
            slug: "writer".to_string(),
            model: Some("claude-3-5-haiku-latest".to_string()),
            system_prompt: Some("You write release notes.".to_string()),
            max_tokens: Some(1024),
            temperature: Some(0.3),
        }];
        AnthropicAgentProvider::new(SecretString::from("test-key"), &settings, profiles).unwrap()
    }

    #[tokio::test]
    async fn profile_shapes_the_request() {
        let agent = provider()
            .resolve("writer", &RequestContext::new())
            .await
            .unwrap();
        let body = serde_json::to_value(agent.request_body("Summarize v2")).unwrap();
        assert_eq!(
            body,
            json!({
                "model": "claude-3-5-haiku-latest",
                "max_tokens": 1024,
                "messages": [{ "role": "user", "content": "Summarize v2" }],
                "system": "You write release notes.",
                "temperature": 0.3
            })
        );
    }

    #[tokio::test]
    async fn unknown_slug_uses_default_model() {
        let provider = provider();
        assert_eq!(provider.client.base_url, "http://localhost:9");

        let agent = provider.resolve("ghost", &RequestContext::new()).await.unwrap();
        assert_eq!(agent.model(), AnthropicSettings::default().default_model);
        let body = serde_json::to_value(agent.request_body("hi")).unwrap();
        assert_eq!(body["max_tokens"], DEFAULT_MAX_TOKENS);
        assert!(body.get("system").is_none());
    }

    #[test]
    fn response_joins_text_and_collects_tool_calls() {
        let response: MessagesResponse = serde_json::from_value(json!({
            "id": "msg_1",
            "content": [
                { "type": "text", "text": "Looking it up. " },
                { "type": "tool_use", "id": "tu_1", "name": "search", "input": { "q": "rust" } },
                { "type": "thinking", "thinking": "..." },
                { "type": "text", "text": "Done." }
            ],
            "stop_reason": "tool_use"
        }))
        .unwrap();

        let agent = to_agent_response(response);
        assert_eq!(agent.text, "Looking it up. Done.");
        assert_eq!(
            agent.tool_calls,
            vec![json!({ "id": "tu_1", "name": "search", "input": { "q": "rust" } })]
        );
    }

    #[test]
    fn from_env_requires_the_key() {
        let settings = AnthropicSettings {
            api_key_env: "FLOWLINE_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..AnthropicSettings::default()
        };
        let err = AnthropicAgentProvider::from_env(&settings, Vec::new())
            .err()
            .unwrap();
        assert!(matches!(err, InfraError::MissingApiKey(name) if name == "FLOWLINE_TEST_KEY_THAT_IS_NEVER_SET"));
    }
}
