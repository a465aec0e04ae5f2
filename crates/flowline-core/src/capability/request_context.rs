//! Caller-supplied request context.
//!
//! Carries the tenant used to scope tool lookup and free-form metadata that
//! hosts may read inside their agent and tool implementations.

use std::collections::HashMap;

use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Unique identifier for this request, shared by nested runs.
    pub request_id: Uuid,
    /// Tenant for tool scoping; `None` uses only global tools.
    pub tenant_id: Option<String>,
    pub metadata: HashMap<String, Value>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            request_id: Uuid::now_v7(),
            tenant_id: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
