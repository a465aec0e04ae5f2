//! `{{ path }}` template resolution against an [`ExecutionContext`].
//!
//! A string that is exactly one placeholder resolves to the raw value at
//! that path, keeping its JSON type. Any other string has each placeholder
//! replaced by the stringified value; placeholders whose path is missing or
//! null are left as written. Arrays and objects are resolved recursively.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

use super::context::ExecutionContext;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").expect("placeholder regex"));

static EXACT_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\{\{\s*([^{}]+?)\s*\}\}\s*$").expect("exact placeholder regex"));

/// Whether `s` contains at least one placeholder.
pub fn is_template(s: &str) -> bool {
    PLACEHOLDER.is_match(s)
}

/// Resolve a single template string.
pub fn resolve_template(template: &str, ctx: &ExecutionContext) -> Value {
    if let Some(caps) = EXACT_PLACEHOLDER.captures(template) {
        return ctx.lookup(&caps[1]).unwrap_or(Value::Null);
    }

    if !is_template(template) {
        return Value::String(template.to_string());
    }

    let rendered = PLACEHOLDER.replace_all(template, |caps: &Captures| {
        match ctx.lookup(&caps[1]) {
            None | Some(Value::Null) => caps[0].to_string(),
            Some(value) => stringify_value(&value),
        }
    });
    Value::String(rendered.into_owned())
}

/// Resolve every string inside `value`, preserving structure.
pub fn resolve_template_value(value: &Value, ctx: &ExecutionContext) -> Value {
    match value {
        Value::String(s) => resolve_template(s, ctx),
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| resolve_template_value(v, ctx)).collect())
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_template_value(v, ctx)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Build a step's input: the resolved mapping, or the context input when the
/// step declares none.
pub fn resolve_input_mapping(mapping: Option<&Value>, ctx: &ExecutionContext) -> Value {
    match mapping {
        Some(mapping) => resolve_template_value(mapping, ctx),
        None => ctx.input().clone(),
    }
}

/// Render a value for string interpolation: strings verbatim, everything
/// else as compact JSON.
pub fn stringify_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_context() -> ExecutionContext {
        let mut ctx = ExecutionContext::new(json!({
            "count": 5,
            "name": "ada",
            "tags": ["x", "y"],
            "nothing": null
        }));
        ctx.set_step_output("fetch", json!({ "body": { "id": 7 } }));
        ctx
    }

    #[test]
    fn exact_match_keeps_type() {
        let ctx = test_context();
        assert_eq!(resolve_template("{{input.count}}", &ctx), json!(5));
        assert_eq!(resolve_template("  {{ input.tags }} ", &ctx), json!(["x", "y"]));
        assert_eq!(resolve_template("{{steps.fetch.body}}", &ctx), json!({ "id": 7 }));
    }

    #[test]
    fn exact_match_missing_is_null() {
        let ctx = test_context();
        assert_eq!(resolve_template("{{input.missing}}", &ctx), Value::Null);
    }

    #[test]
    fn mixed_template_stringifies() {
        let ctx = test_context();
        assert_eq!(resolve_template("count={{input.count}}", &ctx), json!("count=5"));
        assert_eq!(
            resolve_template("{{input.name}} has {{input.tags}}", &ctx),
            json!("ada has [\"x\",\"y\"]")
        );
    }

    #[test]
    fn mixed_template_keeps_unresolved_placeholders() {
        let ctx = test_context();
        assert_eq!(
            resolve_template("a={{input.missing}} b={{ input.nothing }}", &ctx),
            json!("a={{input.missing}} b={{ input.nothing }}")
        );
    }

    #[test]
    fn plain_strings_pass_through() {
        let ctx = test_context();
        assert_eq!(resolve_template("no placeholders", &ctx), json!("no placeholders"));
    }

    #[test]
    fn nested_values_resolve_recursively() {
        let ctx = test_context();
        let mapping = json!({
            "id": "{{steps.fetch.body.id}}",
            "label": "user-{{input.name}}",
            "list": ["{{input.count}}", 3, true],
            "fixed": null
        });
        assert_eq!(
            resolve_template_value(&mapping, &ctx),
            json!({ "id": 7, "label": "user-ada", "list": [5, 3, true], "fixed": null })
        );
    }

    #[test]
    fn missing_mapping_defaults_to_input() {
        let ctx = test_context();
        assert_eq!(resolve_input_mapping(None, &ctx), ctx.input().clone());
        assert_eq!(
            resolve_input_mapping(Some(&json!({ "n": "{{input.count}}" })), &ctx),
            json!({ "n": 5 })
        );
    }
}
