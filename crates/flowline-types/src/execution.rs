//! Execution result types: what a run hands back to its caller.
//!
//! The engine persists nothing itself. Hosts store `ExecutionStepLog`
//! entries as they are sealed and feed completed outputs back in when
//! resuming a suspended run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::workflow::StepType;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Terminal status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Failed,
    Suspended,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Success => "success",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Suspended => "suspended",
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status recorded on a sealed step log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Completed,
    Failed,
    Suspended,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
            StepStatus::Suspended => "suspended",
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Step log
// ---------------------------------------------------------------------------

/// One record per attempted step. Sealed once, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStepLog {
    pub step_id: String,
    pub step_type: StepType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_name: Option<String>,
    pub status: StepStatus,
    pub input: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Index of the enclosing `foreach` iteration, innermost loop first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iteration_index: Option<usize>,
}

// ---------------------------------------------------------------------------
// Suspension / resume
// ---------------------------------------------------------------------------

/// The single active pause point of a suspended run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suspension {
    pub step_id: String,
    /// `{prompt, formSchema, timeout}` for human steps.
    pub data: Value,
}

/// Caller-supplied payload that completes a suspended step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeInput {
    pub step_id: String,
    pub data: Value,
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// Terminal artifact of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub output: Value,
    pub steps: Vec<ExecutionStepLog>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspended: Option<Suspension>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    /// A failed result with no step logs.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Failed,
            output: Value::Null,
            steps: Vec::new(),
            suspended: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }

    pub fn is_suspended(&self) -> bool {
        self.status == ExecutionStatus::Suspended
    }

    /// Logs recorded for `step_id`, in log order.
    pub fn logs_for<'a>(&'a self, step_id: &'a str) -> impl Iterator<Item = &'a ExecutionStepLog> {
        self.steps.iter().filter(move |log| log.step_id == step_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_log() -> ExecutionStepLog {
        let now = DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        ExecutionStepLog {
            step_id: "double".into(),
            step_type: StepType::Transform,
            step_name: None,
            status: StepStatus::Completed,
            input: json!(2),
            output: Some(json!(4)),
            error: None,
            started_at: now,
            completed_at: now,
            duration_ms: 0,
            iteration_index: Some(1),
        }
    }

    #[test]
    fn step_log_serializes_camel_case() {
        let value = serde_json::to_value(sample_log()).unwrap();
        assert_eq!(value["stepId"], "double");
        assert_eq!(value["stepType"], "transform");
        assert_eq!(value["status"], "completed");
        assert_eq!(value["iterationIndex"], 1);
        assert_eq!(value["durationMs"], 0);
        assert!(value.get("error").is_none());
    }

    #[test]
    fn failed_result_has_no_steps() {
        let result = ExecutionResult::failed("maximum nesting depth exceeded");
        assert_eq!(result.status, ExecutionStatus::Failed);
        assert!(result.steps.is_empty());
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["status"], "failed");
        assert_eq!(value["error"], "maximum nesting depth exceeded");
    }

    #[test]
    fn suspended_result_round_trips() {
        let result = ExecutionResult {
            status: ExecutionStatus::Suspended,
            output: Value::Null,
            steps: vec![sample_log()],
            suspended: Some(Suspension {
                step_id: "approve".into(),
                data: json!({ "prompt": "ok?" }),
            }),
            error: None,
        };
        let text = serde_json::to_string(&result).unwrap();
        assert!(text.contains("\"stepId\":\"approve\""));
        let back: ExecutionResult = serde_json::from_str(&text).unwrap();
        assert_eq!(back, result);
        assert_eq!(back.logs_for("double").count(), 1);
    }

    #[test]
    fn resume_input_uses_camel_case() {
        let resume: ResumeInput =
            serde_json::from_value(json!({ "stepId": "approve", "data": { "approved": true } }))
                .unwrap();
        assert_eq!(resume.step_id, "approve");
        assert_eq!(resume.data["approved"], true);
    }
}
