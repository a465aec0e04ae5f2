//! Tool capability: tenant-scoped lookup of executable tool handlers.
//!
//! Hosts either implement [`ToolHandler`] on their own types or wrap an async
//! closure with [`tool_fn`]. [`ToolRegistry`] is an in-memory provider with
//! global tools and per-tenant overrides.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use super::{BoxFuture, CapabilityError};

/// A callable tool.
pub trait ToolHandler: Send + Sync + 'static {
    fn call(&self, args: Value) -> impl Future<Output = Result<Value, CapabilityError>> + Send;
}

pub trait ToolHandlerDyn: Send + Sync {
    fn call_boxed(&self, args: Value) -> BoxFuture<'_, Result<Value, CapabilityError>>;
}

impl<T: ToolHandler> ToolHandlerDyn for T {
    fn call_boxed(&self, args: Value) -> BoxFuture<'_, Result<Value, CapabilityError>> {
        Box::pin(self.call(args))
    }
}

/// Shared, type-erased tool handler.
pub type SharedTool = Arc<dyn ToolHandlerDyn>;

/// Adapter turning an async closure into a [`ToolHandler`].
pub struct FnTool<F>(F);

impl<F, Fut> ToolHandler for FnTool<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, CapabilityError>> + Send + 'static,
{
    fn call(&self, args: Value) -> impl Future<Output = Result<Value, CapabilityError>> + Send {
        (self.0)(args)
    }
}

/// Wrap an async closure as a shared tool handler.
pub fn tool_fn<F, Fut>(f: F) -> SharedTool
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, CapabilityError>> + Send + 'static,
{
    Arc::new(FnTool(f))
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Resolves tool ids to executable handlers for a tenant.
///
/// Ids with no handler are simply absent from the returned map.
pub trait ToolProvider: Send + Sync + 'static {
    fn executable_tools(
        &self,
        tool_ids: &[String],
        tenant_id: Option<&str>,
    ) -> impl Future<Output = Result<HashMap<String, SharedTool>, CapabilityError>> + Send;
}

pub trait ToolProviderDyn: Send + Sync {
    fn executable_tools_boxed<'a>(
        &'a self,
        tool_ids: &'a [String],
        tenant_id: Option<&'a str>,
    ) -> BoxFuture<'a, Result<HashMap<String, SharedTool>, CapabilityError>>;
}

impl<T: ToolProvider> ToolProviderDyn for T {
    fn executable_tools_boxed<'a>(
        &'a self,
        tool_ids: &'a [String],
        tenant_id: Option<&'a str>,
    ) -> BoxFuture<'a, Result<HashMap<String, SharedTool>, CapabilityError>> {
        Box::pin(self.executable_tools(tool_ids, tenant_id))
    }
}

pub type SharedToolProvider = Arc<dyn ToolProviderDyn>;

// ---------------------------------------------------------------------------
// ToolRegistry
// ---------------------------------------------------------------------------

/// In-memory tool provider. Tenant-scoped tools shadow global ones.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    global: HashMap<String, SharedTool>,
    tenants: HashMap<String, HashMap<String, SharedTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool visible to every tenant.
    pub fn register(mut self, id: impl Into<String>, tool: SharedTool) -> Self {
        self.global.insert(id.into(), tool);
        self
    }

    /// Register a tool visible only to `tenant_id`.
    pub fn register_for_tenant(
        mut self,
        tenant_id: impl Into<String>,
        id: impl Into<String>,
        tool: SharedTool,
    ) -> Self {
        self.tenants
            .entry(tenant_id.into())
            .or_default()
            .insert(id.into(), tool);
        self
    }

    fn lookup(&self, id: &str, tenant_id: Option<&str>) -> Option<SharedTool> {
        tenant_id
            .and_then(|tenant| self.tenants.get(tenant))
            .and_then(|tools| tools.get(id))
            .or_else(|| self.global.get(id))
            .cloned()
    }

    pub fn tool_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.global.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl ToolProvider for ToolRegistry {
    async fn executable_tools(
        &self,
        tool_ids: &[String],
        tenant_id: Option<&str>,
    ) -> Result<HashMap<String, SharedTool>, CapabilityError> {
        Ok(tool_ids
            .iter()
            .filter_map(|id| self.lookup(id, tenant_id).map(|tool| (id.clone(), tool)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo_tool(tag: &'static str) -> SharedTool {
        tool_fn(move |args| async move { Ok::<Value, CapabilityError>(json!({ "tag": tag, "args": args })) })
    }

    #[tokio::test]
    async fn tool_fn_invokes_closure() {
        let tool = echo_tool("echo");
        let out = tool.call_boxed(json!({ "x": 1 })).await.unwrap();
        assert_eq!(out, json!({ "tag": "echo", "args": { "x": 1 } }));
    }

    #[tokio::test]
    async fn registry_returns_only_known_tools() {
        let registry = ToolRegistry::new().register("fetch", echo_tool("global"));
        let ids = vec!["fetch".to_string(), "missing".to_string()];
        let tools = registry.executable_tools(&ids, None).await.unwrap();
        assert_eq!(tools.len(), 1);
        assert!(tools.contains_key("fetch"));
    }

    #[tokio::test]
    async fn tenant_tools_shadow_global_and_stay_scoped() {
        let registry = ToolRegistry::new()
            .register("fetch", echo_tool("global"))
            .register_for_tenant("a", "fetch", echo_tool("tenant-a"))
            .register_for_tenant("a", "secret", echo_tool("secret"));
        let ids = vec!["fetch".to_string(), "secret".to_string()];

        let for_a = registry.executable_tools(&ids, Some("a")).await.unwrap();
        let out = for_a["fetch"].call_boxed(json!(null)).await.unwrap();
        assert_eq!(out["tag"], "tenant-a");
        assert!(for_a.contains_key("secret"));

        let for_b = registry.executable_tools(&ids, Some("b")).await.unwrap();
        let out = for_b["fetch"].call_boxed(json!(null)).await.unwrap();
        assert_eq!(out["tag"], "global");
        assert!(!for_b.contains_key("secret"));
    }
}
