//! Built-in tools available to every tenant.

pub mod http;

use std::sync::Arc;

use flowline_core::capability::tool::ToolRegistry;

pub use http::{HttpRequestTool, HTTP_REQUEST_TOOL_ID};

use crate::InfraError;

/// Registry holding the built-in tools.
pub fn builtin_tools() -> Result<ToolRegistry, InfraError> {
    let http = Arc::new(HttpRequestTool::new()?);
    Ok(ToolRegistry::new().register(HTTP_REQUEST_TOOL_ID, http))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_include_http_request() {
        let registry = builtin_tools().unwrap();
        assert_eq!(registry.tool_ids(), vec![HTTP_REQUEST_TOOL_ID]);
    }
}
