//! `flowline inspect`: render a persisted step event log.

use std::path::Path;

use anyhow::{Context, Result};
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;

use flowline_infra::event_sink::read_step_logs;
use flowline_types::execution::{ExecutionStepLog, StepStatus};

pub async fn inspect(file: &Path, json: bool) -> Result<()> {
    let logs = read_step_logs(file)
        .await
        .with_context(|| format!("Failed to read event log {}", file.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&logs)?);
        return Ok(());
    }

    if logs.is_empty() {
        println!();
        println!("  No step events in {}.", file.display());
        println!();
        return Ok(());
    }

    println!();
    println!(
        "  Step events from {}",
        style(file.display()).cyan()
    );
    println!();
    println!("{}", step_table(&logs));
    println!();
    Ok(())
}

/// Table of step logs, one row per log in log order.
pub fn step_table(logs: &[ExecutionStepLog]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Step").fg(Color::Cyan),
            Cell::new("Type"),
            Cell::new("Status"),
            Cell::new("Iter"),
            Cell::new("Duration"),
            Cell::new("Error"),
        ]);

    for log in logs {
        let iteration = log
            .iteration_index
            .map(|i| i.to_string())
            .unwrap_or_else(|| "-".to_string());
        let error = log
            .error
            .as_ref()
            .map(|e| e.chars().take(60).collect::<String>())
            .unwrap_or_else(|| "-".to_string());

        table.add_row(vec![
            Cell::new(&log.step_id),
            Cell::new(log.step_type),
            format_status(log.status),
            Cell::new(iteration),
            Cell::new(format!("{}ms", log.duration_ms)),
            Cell::new(error),
        ]);
    }
    table
}

fn format_status(status: StepStatus) -> Cell {
    match status {
        StepStatus::Completed => Cell::new("completed").fg(Color::Green),
        StepStatus::Failed => Cell::new("failed").fg(Color::Red),
        StepStatus::Suspended => Cell::new("suspended").fg(Color::Magenta),
    }
}
