//! Agent capability: resolve an agent by slug, then generate text.

use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::request_context::RequestContext;
use super::{BoxFuture, CapabilityError};

/// Options forwarded to [`AgentHandle::generate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateOptions {
    pub max_steps: Option<u32>,
}

/// What an agent produced for one prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResponse {
    pub text: String,
    #[serde(default)]
    pub tool_calls: Vec<Value>,
}

/// A resolved agent, ready to generate.
pub trait AgentHandle: Send + Sync + 'static {
    fn generate(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> impl Future<Output = Result<AgentResponse, CapabilityError>> + Send;
}

/// Looks agents up by slug.
pub trait AgentProvider: Send + Sync + 'static {
    type Handle: AgentHandle;

    fn resolve(
        &self,
        slug: &str,
        request: &RequestContext,
    ) -> impl Future<Output = Result<Self::Handle, CapabilityError>> + Send;
}

// ---------------------------------------------------------------------------
// Object-safe twins
// ---------------------------------------------------------------------------

pub trait AgentHandleDyn: Send + Sync {
    fn generate_boxed<'a>(
        &'a self,
        prompt: &'a str,
        options: &'a GenerateOptions,
    ) -> BoxFuture<'a, Result<AgentResponse, CapabilityError>>;
}

impl<T: AgentHandle> AgentHandleDyn for T {
    fn generate_boxed<'a>(
        &'a self,
        prompt: &'a str,
        options: &'a GenerateOptions,
    ) -> BoxFuture<'a, Result<AgentResponse, CapabilityError>> {
        Box::pin(self.generate(prompt, options))
    }
}

pub trait AgentProviderDyn: Send + Sync {
    fn resolve_boxed<'a>(
        &'a self,
        slug: &'a str,
        request: &'a RequestContext,
    ) -> BoxFuture<'a, Result<Box<dyn AgentHandleDyn>, CapabilityError>>;
}

impl<T: AgentProvider> AgentProviderDyn for T {
    fn resolve_boxed<'a>(
        &'a self,
        slug: &'a str,
        request: &'a RequestContext,
    ) -> BoxFuture<'a, Result<Box<dyn AgentHandleDyn>, CapabilityError>> {
        Box::pin(async move {
            let handle = self.resolve(slug, request).await?;
            Ok(Box::new(handle) as Box<dyn AgentHandleDyn>)
        })
    }
}

/// Shared, type-erased agent provider held by the engine.
pub type SharedAgentProvider = Arc<dyn AgentProviderDyn>;
