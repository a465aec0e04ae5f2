//! Workflow definition parsing, validation, and filesystem operations.
//!
//! Definitions are stored as YAML or JSON. Parsing always validates, so a
//! definition obtained through this module has sibling-unique step ids and
//! branch conditions that compile.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use flowline_types::workflow::{StepConfig, WorkflowDefinition, WorkflowStep};
use thiserror::Error;

use super::expression;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can occur while loading a workflow definition.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// YAML/JSON parse failure, including step configs that do not match
    /// their declared type.
    #[error("parse error: {0}")]
    ParseError(String),

    /// Structural validation failure.
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Filesystem I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// A branch condition is outside the condition grammar.
    #[error("expression error in step '{step_id}': {message}")]
    ExpressionError { step_id: String, message: String },
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse a YAML string into a validated `WorkflowDefinition`.
pub fn parse_workflow_yaml(yaml: &str) -> Result<WorkflowDefinition, WorkflowError> {
    let def: WorkflowDefinition =
        serde_yaml_ng::from_str(yaml).map_err(|e| WorkflowError::ParseError(e.to_string()))?;
    validate_definition(&def)?;
    Ok(def)
}

/// Parse a JSON string into a validated `WorkflowDefinition`.
pub fn parse_workflow_json(json: &str) -> Result<WorkflowDefinition, WorkflowError> {
    let def: WorkflowDefinition =
        serde_json::from_str(json).map_err(|e| WorkflowError::ParseError(e.to_string()))?;
    validate_definition(&def)?;
    Ok(def)
}

/// Serialize a `WorkflowDefinition` to a YAML string.
pub fn serialize_workflow_yaml(def: &WorkflowDefinition) -> Result<String, WorkflowError> {
    serde_yaml_ng::to_string(def).map_err(|e| WorkflowError::ParseError(e.to_string()))
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate structural constraints on a `WorkflowDefinition`.
///
/// Walks every nested step list and checks:
/// - Step IDs are non-empty and unique among their siblings
/// - Branch conditions compile
/// - Foreach `collectionPath` and `itemVar` are non-empty, `concurrency >= 1`
///
/// Equal ids in different lists are allowed: each list keys its own outputs.
pub fn validate_definition(def: &WorkflowDefinition) -> Result<(), WorkflowError> {
    validate_steps(&def.steps)
}

fn validate_steps(steps: &[WorkflowStep]) -> Result<(), WorkflowError> {
    let mut seen_ids = HashSet::new();
    for step in steps {
        if step.id.trim().is_empty() {
            return Err(WorkflowError::ValidationError(
                "step ID must not be empty".to_string(),
            ));
        }
        if !seen_ids.insert(step.id.as_str()) {
            return Err(WorkflowError::ValidationError(format!(
                "duplicate step ID: '{}'",
                step.id
            )));
        }
        validate_step(step)?;
    }
    Ok(())
}

fn validate_step(step: &WorkflowStep) -> Result<(), WorkflowError> {
    match &step.config {
        StepConfig::Branch(branch) => {
            for candidate in &branch.branches {
                expression::compile(&candidate.condition).map_err(|e| {
                    WorkflowError::ExpressionError {
                        step_id: step.id.clone(),
                        message: format!("condition '{}': {e}", candidate.condition),
                    }
                })?;
            }
        }
        StepConfig::Foreach(foreach) => {
            if foreach.collection_path.trim().is_empty() {
                return Err(WorkflowError::ValidationError(format!(
                    "foreach step '{}' has an empty collectionPath",
                    step.id
                )));
            }
            if foreach.item_var().trim().is_empty() {
                return Err(WorkflowError::ValidationError(format!(
                    "foreach step '{}' has an empty itemVar",
                    step.id
                )));
            }
            if foreach.concurrency == Some(0) {
                return Err(WorkflowError::ValidationError(format!(
                    "foreach step '{}': concurrency must be >= 1",
                    step.id
                )));
            }
        }
        _ => {}
    }

    for list in step.config.child_lists() {
        validate_steps(list)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Filesystem operations
// ---------------------------------------------------------------------------

/// Load a workflow definition, choosing the format by file extension.
///
/// `.json` files are parsed as JSON; everything else as YAML.
pub fn load_workflow_file(path: &Path) -> Result<WorkflowDefinition, WorkflowError> {
    let content = std::fs::read_to_string(path)?;
    if path.extension().is_some_and(|ext| ext == "json") {
        parse_workflow_json(&content)
    } else {
        parse_workflow_yaml(&content)
    }
}

/// Save a workflow definition to a YAML file.
///
/// Creates parent directories if they don't exist.
pub fn save_workflow_file(path: &Path, def: &WorkflowDefinition) -> Result<(), WorkflowError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let yaml = serialize_workflow_yaml(def)?;
    std::fs::write(path, yaml)?;
    Ok(())
}

/// Whether `path` has a workflow definition extension.
pub fn is_workflow_file(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext == "yaml" || ext == "yml" || ext == "json")
}

/// Discover all workflow files under `base_dir`.
///
/// Scans for `.yaml`, `.yml` and `.json` files recursively. Files that fail
/// to parse or validate are skipped with a warning.
pub fn discover_workflows(
    base_dir: &Path,
) -> Result<Vec<(PathBuf, WorkflowDefinition)>, WorkflowError> {
    let mut results = Vec::new();
    if !base_dir.exists() {
        return Ok(results);
    }
    discover_recursive(base_dir, &mut results)?;
    results.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(results)
}

fn discover_recursive(
    dir: &Path,
    results: &mut Vec<(PathBuf, WorkflowDefinition)>,
) -> Result<(), WorkflowError> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            discover_recursive(&path, results)?;
        } else if is_workflow_file(&path) {
            match load_workflow_file(&path) {
                Ok(def) => results.push((path, def)),
                Err(e) => {
                    tracing::warn!(?path, error = %e, "skipping unparseable workflow file");
                }
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use flowline_types::workflow::StepType;
    use tempfile::TempDir;

    const DIGEST_YAML: &str = r#"
id: digest
name: Daily digest
steps:
  - id: fetch
    type: tool
    config:
      toolId: http_request
      parameters:
        url: "{{input.url}}"
  - id: route
    type: branch
    config:
      branches:
        - id: ok
          condition: "steps.fetch.status == 200"
          steps:
            - id: summarize
              type: agent
              config:
                agentSlug: writer
                promptTemplate: "Summarize {{steps.fetch.body}}"
      defaultBranch:
        - id: summarize
          type: transform
"#;

    #[test]
    fn parses_valid_yaml() {
        let def = parse_workflow_yaml(DIGEST_YAML).unwrap();
        assert_eq!(def.id.as_deref(), Some("digest"));
        assert_eq!(def.steps.len(), 2);
        assert_eq!(def.steps[1].step_type(), StepType::Branch);
    }

    #[test]
    fn parses_valid_json() {
        let def = parse_workflow_json(
            r#"{"steps":[{"id":"wait","type":"delay","config":{"delayMs":5}}]}"#,
        )
        .unwrap();
        assert_eq!(def.steps[0].step_type(), StepType::Delay);
    }

    #[test]
    fn rejects_duplicate_sibling_ids() {
        let yaml = r#"
steps:
  - id: a
    type: transform
  - id: a
    type: transform
"#;
        let err = parse_workflow_yaml(yaml).unwrap_err();
        assert!(matches!(err, WorkflowError::ValidationError(ref m) if m.contains("'a'")));
    }

    #[test]
    fn rejects_duplicates_inside_nested_lists() {
        let yaml = r#"
steps:
  - id: fan
    type: parallel
    config:
      branches:
        - steps:
            - id: x
              type: transform
            - id: x
              type: transform
"#;
        assert!(matches!(
            parse_workflow_yaml(yaml),
            Err(WorkflowError::ValidationError(_))
        ));
    }

    #[test]
    fn rejects_conditions_outside_grammar() {
        for condition in ["input.x + 1 > 2", "process.exit()", "input.a =="] {
            let yaml = format!(
                r#"
steps:
  - id: route
    type: branch
    config:
      branches:
        - condition: "{condition}"
          steps: []
"#
            );
            let err = parse_workflow_yaml(&yaml).unwrap_err();
            assert!(
                matches!(err, WorkflowError::ExpressionError { ref step_id, .. } if step_id == "route"),
                "condition {condition} gave {err:?}"
            );
        }
    }

    #[test]
    fn rejects_zero_foreach_concurrency() {
        let yaml = r#"
steps:
  - id: each
    type: foreach
    config:
      collectionPath: input.items
      concurrency: 0
      steps: []
"#;
        assert!(matches!(
            parse_workflow_yaml(yaml),
            Err(WorkflowError::ValidationError(_))
        ));
    }

    #[test]
    fn rejects_config_that_does_not_match_type() {
        let yaml = r#"
steps:
  - id: call
    type: tool
    config:
      parameters: {}
"#;
        assert!(matches!(
            parse_workflow_yaml(yaml),
            Err(WorkflowError::ParseError(ref m)) if m.contains("toolId")
        ));
    }

    #[test]
    fn empty_step_list_is_valid() {
        let def = parse_workflow_yaml("steps: []").unwrap();
        assert!(def.steps.is_empty());
    }

    #[test]
    fn save_and_load_round_trip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/digest.yaml");
        let def = parse_workflow_yaml(DIGEST_YAML).unwrap();
        save_workflow_file(&path, &def).unwrap();
        assert_eq!(load_workflow_file(&path).unwrap(), def);
    }

    #[test]
    fn discover_skips_invalid_files() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("team")).unwrap();
        std::fs::write(tmp.path().join("digest.yaml"), DIGEST_YAML).unwrap();
        std::fs::write(
            tmp.path().join("team/wait.json"),
            r#"{"id":"wait","steps":[{"id":"w","type":"delay","config":{"delayMs":1}}]}"#,
        )
        .unwrap();
        std::fs::write(tmp.path().join("broken.yml"), "steps: [ {").unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();

        let found = discover_workflows(tmp.path()).unwrap();
        let ids: Vec<_> = found.iter().filter_map(|(_, d)| d.id.clone()).collect();
        assert_eq!(ids, vec!["digest".to_string(), "wait".to_string()]);
    }

    #[test]
    fn discover_missing_dir_is_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(discover_workflows(&tmp.path().join("nope")).unwrap().is_empty());
    }
}
