//! Step event sink: called once for every sealed step log.
//!
//! The engine invokes the sink synchronously from the executing task, so
//! implementations should hand work off quickly (append to a buffer, send on
//! a channel) rather than block.

use std::sync::{Arc, Mutex};

use flowline_types::execution::ExecutionStepLog;

pub trait StepEventSink: Send + Sync {
    fn on_step_event(&self, log: &ExecutionStepLog);
}

impl<F> StepEventSink for F
where
    F: Fn(&ExecutionStepLog) + Send + Sync,
{
    fn on_step_event(&self, log: &ExecutionStepLog) {
        self(log)
    }
}

pub type SharedStepEventSink = Arc<dyn StepEventSink>;

/// Sink that keeps every event in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<ExecutionStepLog>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events received so far.
    pub fn events(&self) -> Vec<ExecutionStepLog> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl StepEventSink for CollectingSink {
    fn on_step_event(&self, log: &ExecutionStepLog) {
        if let Ok(mut events) = self.events.lock() {
            events.push(log.clone());
        }
    }
}
