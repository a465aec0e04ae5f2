//! Per-run execution context: input, step outputs and variables.
//!
//! One `ExecutionContext` is owned by each execution path. Branches,
//! parallel branches and foreach iterations receive a [`fork`], whose step
//! and variable entries shadow the parent's without writing back to it.
//! `input` is shared behind an `Arc` and never mutated after creation.
//!
//! [`fork`]: ExecutionContext::fork

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::path::{parse_path, resolve_segments};

/// Roots that templates and conditions may reference.
pub const CONTEXT_ROOTS: [&str; 3] = ["input", "steps", "variables"];

#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    input: Arc<Value>,
    steps: HashMap<String, Value>,
    variables: HashMap<String, Value>,
}

impl ExecutionContext {
    pub fn new(input: Value) -> Self {
        Self {
            input: Arc::new(input),
            steps: HashMap::new(),
            variables: HashMap::new(),
        }
    }

    /// Seed step outputs, e.g. with completed steps from an earlier attempt.
    pub fn with_steps(mut self, steps: HashMap<String, Value>) -> Self {
        self.steps.extend(steps);
        self
    }

    pub fn input(&self) -> &Value {
        &self.input
    }

    #[cfg(test)]
    pub(crate) fn shared_input(&self) -> &Arc<Value> {
        &self.input
    }

    /// Independent copy for a concurrent or conditional branch.
    pub fn fork(&self) -> Self {
        self.clone()
    }

    pub fn set_step_output(&mut self, step_id: &str, output: Value) {
        self.steps.insert(step_id.to_string(), output);
    }

    pub fn step_output(&self, step_id: &str) -> Option<&Value> {
        self.steps.get(step_id)
    }

    pub fn steps(&self) -> &HashMap<String, Value> {
        &self.steps
    }

    pub fn set_variable(&mut self, name: &str, value: Value) {
        self.variables.insert(name.to_string(), value);
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// Resolve a rooted path (`input.x`, `steps.fetch.body`, `variables.item`).
    pub fn lookup(&self, path: &str) -> Option<Value> {
        let segments = parse_path(path)?;
        self.lookup_segments(&segments)
    }

    /// Resolve pre-split path segments. The first segment names the root.
    pub fn lookup_segments<S: AsRef<str>>(&self, segments: &[S]) -> Option<Value> {
        let (root, rest) = segments.split_first()?;
        match root.as_ref() {
            "input" => resolve_segments(&self.input, rest).cloned(),
            "steps" => Self::lookup_map(&self.steps, rest),
            "variables" => Self::lookup_map(&self.variables, rest),
            _ => None,
        }
    }

    fn lookup_map<S: AsRef<str>>(map: &HashMap<String, Value>, rest: &[S]) -> Option<Value> {
        match rest.split_first() {
            None => Some(Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.clone())).collect::<Map<_, _>>(),
            )),
            Some((key, tail)) => {
                let entry = map.get(key.as_ref())?;
                resolve_segments(entry, tail).cloned()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_context() -> ExecutionContext {
        let mut ctx = ExecutionContext::new(json!({ "url": "https://x", "items": [1, 2] }));
        ctx.set_step_output("fetch", json!({ "status": 200, "body": { "ok": true } }));
        ctx.set_variable("item", json!("a"));
        ctx
    }

    #[test]
    fn lookup_covers_all_roots() {
        let ctx = test_context();
        assert_eq!(ctx.lookup("input.url"), Some(json!("https://x")));
        assert_eq!(ctx.lookup("input.items[1]"), Some(json!(2)));
        assert_eq!(ctx.lookup("steps.fetch.body.ok"), Some(json!(true)));
        assert_eq!(ctx.lookup("variables.item"), Some(json!("a")));
        assert_eq!(ctx.lookup("steps")
            .and_then(|steps| steps.get("fetch").cloned())
            .map(|fetch| fetch["status"].clone()), Some(json!(200)));
    }

    #[test]
    fn unknown_root_or_missing_key_is_none() {
        let ctx = test_context();
        assert_eq!(ctx.lookup("env.HOME"), None);
        assert_eq!(ctx.lookup("steps.missing"), None);
        assert_eq!(ctx.lookup("variables.index"), None);
        assert_eq!(ctx.lookup(""), None);
    }

    #[test]
    fn fork_isolates_steps_and_variables() {
        let parent = test_context();
        let mut child = parent.fork();
        child.set_step_output("fetch", json!("shadowed"));
        child.set_variable("index", json!(3));

        assert_eq!(child.lookup("steps.fetch"), Some(json!("shadowed")));
        assert_eq!(parent.lookup("steps.fetch.status"), Some(json!(200)));
        assert_eq!(parent.variable("index"), None);
        assert!(std::ptr::eq(parent.input(), child.input()));
    }

    #[test]
    fn with_steps_seeds_outputs() {
        let ctx = ExecutionContext::new(json!({}))
            .with_steps(HashMap::from([("prior".to_string(), json!(1))]));
        assert_eq!(ctx.step_output("prior"), Some(&json!(1)));
    }
}
