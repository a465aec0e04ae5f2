//! `flowline validate`: parse, validate and outline a definition.

use std::path::Path;

use anyhow::Result;
use console::style;

use flowline_core::workflow::definition::{load_workflow_file, WorkflowError};
use flowline_types::workflow::{WorkflowDefinition, WorkflowStep};

/// Load and validate a workflow file with user-facing error messages.
pub fn load_definition(file: &Path) -> Result<WorkflowDefinition> {
    load_workflow_file(file).map_err(|e| match e {
        WorkflowError::ParseError(msg) => anyhow::anyhow!("Failed to parse workflow: {msg}"),
        WorkflowError::ValidationError(msg) => anyhow::anyhow!("Workflow validation failed: {msg}"),
        WorkflowError::ExpressionError { step_id, message } => {
            anyhow::anyhow!("Invalid condition in step '{step_id}': {message}")
        }
        other => anyhow::anyhow!("Failed to load workflow {}: {other}", file.display()),
    })
}

/// Name used when printing a definition.
pub fn display_name(def: &WorkflowDefinition, file: &Path) -> String {
    def.name
        .clone()
        .or_else(|| def.id.clone())
        .or_else(|| file.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "workflow".to_string())
}

pub fn validate(file: &Path, json: bool, quiet: bool) -> Result<()> {
    let def = load_definition(file)?;
    let total = count_steps(&def.steps);

    if json {
        let out = serde_json::json!({
            "valid": true,
            "id": def.id,
            "name": def.name,
            "topLevelSteps": def.steps.len(),
            "totalSteps": total,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }
    if quiet {
        return Ok(());
    }

    println!();
    println!(
        "  {} Workflow '{}' is valid ({} steps)",
        style("✓").green().bold(),
        style(display_name(&def, file)).cyan(),
        total
    );
    println!();
    for line in outline(&def.steps, 1) {
        println!("{line}");
    }
    println!();
    Ok(())
}

fn count_steps(steps: &[WorkflowStep]) -> usize {
    steps
        .iter()
        .map(|step| {
            1 + step
                .config
                .child_lists()
                .into_iter()
                .map(count_steps)
                .sum::<usize>()
        })
        .sum()
}

/// One indented line per step, children below their parent.
fn outline(steps: &[WorkflowStep], depth: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for step in steps {
        let indent = "  ".repeat(depth);
        let label = match &step.name {
            Some(name) => format!("{} {}", step.id, style(format!("\"{name}\"")).dim()),
            None => step.id.clone(),
        };
        lines.push(format!("{indent}- {label} {}", style(format!("[{}]", step.step_type())).yellow()));
        for child in step.config.child_lists() {
            lines.extend(outline(child, depth + 1));
        }
    }
    lines
}
