//! `http_request` tool: performs one HTTP request and returns
//! `{status, headers, body}`.
//!
//! Arguments: `{method?, url, headers?, body?}`. `method` defaults to `GET`.
//! A string `body` is sent verbatim; any other JSON value is sent as JSON.
//! The response body is parsed as JSON when possible, otherwise returned as
//! a string.

use std::collections::HashMap;
use std::time::Duration;

use flowline_core::capability::tool::ToolHandler;
use flowline_core::capability::CapabilityError;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::InfraError;

pub const HTTP_REQUEST_TOOL_ID: &str = "http_request";

#[derive(Debug, Clone, Deserialize)]
struct HttpRequestArgs {
    #[serde(default)]
    method: Option<String>,
    url: String,
    #[serde(default)]
    headers: HashMap<String, String>,
    #[serde(default)]
    body: Option<Value>,
}

impl HttpRequestArgs {
    fn parse(args: Value) -> Result<Self, CapabilityError> {
        serde_json::from_value(args)
            .map_err(|e| CapabilityError::Tool(format!("invalid http_request arguments: {e}")))
    }

    fn method(&self) -> Result<Method, CapabilityError> {
        let name = self.method.as_deref().unwrap_or("GET").to_ascii_uppercase();
        Method::from_bytes(name.as_bytes())
            .map_err(|_| CapabilityError::Tool(format!("invalid HTTP method: {name}")))
    }
}

pub struct HttpRequestTool {
    client: reqwest::Client,
}

impl HttpRequestTool {
    pub fn new() -> Result<Self, InfraError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self { client })
    }
}

impl ToolHandler for HttpRequestTool {
    async fn call(&self, args: Value) -> Result<Value, CapabilityError> {
        let args = HttpRequestArgs::parse(args)?;
        let method = args.method()?;
        tracing::debug!(%method, url = %args.url, "http_request");

        let mut request = self.client.request(method, &args.url);
        for (name, value) in &args.headers {
            request = request.header(name, value);
        }
        request = match args.body {
            Some(Value::String(text)) => request.body(text),
            Some(Value::Null) | None => request,
            Some(other) => request.json(&other),
        };

        let response = request
            .send()
            .await
            .map_err(|e| CapabilityError::Tool(format!("HTTP request failed: {e}")))?;

        let status = response.status().as_u16();
        let headers: Map<String, Value> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), Value::String(v.to_string())))
            })
            .collect();
        let text = response
            .text()
            .await
            .map_err(|e| CapabilityError::Tool(format!("failed to read response body: {e}")))?;

        Ok(json!({
            "status": status,
            "headers": headers,
            "body": decode_body(text),
        }))
    }
}

fn decode_body(text: String) -> Value {
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_default_to_get_without_body() {
        let args = HttpRequestArgs::parse(json!({ "url": "https://example.com" })).unwrap();
        assert_eq!(args.method().unwrap(), Method::GET);
        assert!(args.headers.is_empty());
        assert!(args.body.is_none());
    }

    #[test]
    fn method_is_case_insensitive() {
        let args = HttpRequestArgs::parse(json!({
            "method": "post",
            "url": "https://example.com",
            "headers": { "x-trace": "1" },
            "body": { "a": 1 }
        }))
        .unwrap();
        assert_eq!(args.method().unwrap(), Method::POST);
        assert_eq!(args.headers["x-trace"], "1");
    }

    #[test]
    fn missing_url_is_a_tool_error() {
        let err = HttpRequestArgs::parse(json!({ "method": "GET" })).unwrap_err();
        assert!(matches!(err, CapabilityError::Tool(m) if m.contains("url")));
    }

    #[test]
    fn bad_method_is_rejected() {
        let args = HttpRequestArgs::parse(json!({ "method": "GE T", "url": "x" })).unwrap();
        assert!(args.method().is_err());
    }

    #[test]
    fn body_is_json_when_possible() {
        assert_eq!(decode_body(r#"{"ok":true}"#.to_string()), json!({ "ok": true }));
        assert_eq!(decode_body("plain text".to_string()), json!("plain text"));
    }

    #[tokio::test]
    async fn unreachable_host_fails_the_call() {
        let tool = HttpRequestTool::new().unwrap();
        let err = tool
            .call(json!({ "url": "not a url" }))
            .await
            .unwrap_err();
        assert!(matches!(err, CapabilityError::Tool(m) if m.starts_with("HTTP request failed")));
    }
}
