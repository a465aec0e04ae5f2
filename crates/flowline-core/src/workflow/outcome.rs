//! Outcomes of step lists, and the rules for joining concurrent ones.
//!
//! A step list halts on its first failure or suspension. Concurrent lists
//! (parallel branches, foreach iterations) always run to completion and are
//! joined afterwards: any failure wins over any suspension, and among equals
//! the lowest index wins.

use std::collections::HashMap;

use flowline_types::execution::{ExecutionStatus, ExecutionStepLog, StepStatus, Suspension};
use serde_json::Value;

/// Result of running a step list (or a whole workflow).
#[derive(Debug, Clone, PartialEq)]
pub struct ListOutcome {
    pub status: ExecutionStatus,
    /// Last completed output; the joined array for concurrent lists.
    pub output: Value,
    pub error: Option<String>,
    pub suspended: Option<Suspension>,
}

impl ListOutcome {
    pub fn success(output: Value) -> Self {
        Self {
            status: ExecutionStatus::Success,
            output,
            error: None,
            suspended: None,
        }
    }

    pub fn failed(output: Value, error: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Failed,
            output,
            error: Some(error.into()),
            suspended: None,
        }
    }

    pub fn suspended(output: Value, suspension: Suspension) -> Self {
        Self {
            status: ExecutionStatus::Suspended,
            output,
            error: None,
            suspended: Some(suspension),
        }
    }

    /// Whether a sequential list must stop here.
    pub fn halts(&self) -> bool {
        self.status != ExecutionStatus::Success
    }

    /// Status recorded on the log of the step that produced this outcome.
    pub fn step_status(&self) -> StepStatus {
        match self.status {
            ExecutionStatus::Success => StepStatus::Completed,
            ExecutionStatus::Failed => StepStatus::Failed,
            ExecutionStatus::Suspended => StepStatus::Suspended,
        }
    }
}

/// Join the outcomes of concurrent lists, given in index order.
///
/// On success the output is the array of each list's output in index order.
/// On failure or suspension the winning list's output, error and suspension
/// are reported as-is.
pub fn join_outcomes(outcomes: Vec<ListOutcome>) -> ListOutcome {
    if let Some(failed) = outcomes
        .iter()
        .find(|o| o.status == ExecutionStatus::Failed)
    {
        return failed.clone();
    }
    if let Some(suspended) = outcomes
        .iter()
        .find(|o| o.status == ExecutionStatus::Suspended)
    {
        return suspended.clone();
    }
    ListOutcome::success(Value::Array(
        outcomes.into_iter().map(|o| o.output).collect(),
    ))
}

/// Build the `existingSteps` map for a resume from earlier step logs.
///
/// Takes every completed log outside a foreach iteration; iteration-local
/// outputs are recomputed when the loop re-runs. Later logs for the same
/// id win.
pub fn existing_steps_from_logs<'a>(
    logs: impl IntoIterator<Item = &'a ExecutionStepLog>,
) -> HashMap<String, Value> {
    logs.into_iter()
        .filter(|log| log.status == StepStatus::Completed && log.iteration_index.is_none())
        .map(|log| {
            (
                log.step_id.clone(),
                log.output.clone().unwrap_or(Value::Null),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use flowline_types::workflow::StepType;
    use serde_json::json;

    fn suspension(step_id: &str) -> Suspension {
        Suspension {
            step_id: step_id.into(),
            data: json!({}),
        }
    }

    #[test]
    fn join_collects_outputs_in_index_order() {
        let joined = join_outcomes(vec![
            ListOutcome::success(json!(1)),
            ListOutcome::success(json!(2)),
        ]);
        assert_eq!(joined, ListOutcome::success(json!([1, 2])));
    }

    #[test]
    fn failure_beats_earlier_suspension() {
        let joined = join_outcomes(vec![
            ListOutcome::suspended(json!(null), suspension("approve")),
            ListOutcome::success(json!(2)),
            ListOutcome::failed(json!("partial"), "boom"),
        ]);
        assert_eq!(joined.status, ExecutionStatus::Failed);
        assert_eq!(joined.error.as_deref(), Some("boom"));
        assert_eq!(joined.output, json!("partial"));
        assert!(joined.suspended.is_none());
    }

    #[test]
    fn lowest_index_wins_among_equals() {
        let joined = join_outcomes(vec![
            ListOutcome::success(json!(0)),
            ListOutcome::suspended(json!(null), suspension("first")),
            ListOutcome::suspended(json!(null), suspension("second")),
        ]);
        assert_eq!(joined.suspended.map(|s| s.step_id), Some("first".to_string()));
    }

    #[test]
    fn empty_join_is_empty_array() {
        assert_eq!(join_outcomes(Vec::new()).output, json!([]));
    }

    #[test]
    fn existing_steps_take_completed_top_level_logs() {
        let now = Utc::now();
        let log = |id: &str, status, output: Value, iteration_index| ExecutionStepLog {
            step_id: id.into(),
            step_type: StepType::Transform,
            step_name: None,
            status,
            input: Value::Null,
            output: Some(output),
            error: None,
            started_at: now,
            completed_at: now,
            duration_ms: 0,
            iteration_index,
        };
        let logs = vec![
            log("fetch", StepStatus::Completed, json!({ "ok": true }), None),
            log("double", StepStatus::Completed, json!(2), Some(0)),
            log("approve", StepStatus::Suspended, json!(null), None),
            log("broken", StepStatus::Failed, json!(null), None),
        ];

        let existing = existing_steps_from_logs(&logs);
        assert_eq!(existing.len(), 1);
        assert_eq!(existing["fetch"], json!({ "ok": true }));
    }
}
