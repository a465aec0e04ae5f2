//! JSONL persistence for step events.
//!
//! [`JsonlEventSink`] appends every sealed step log as one JSON line. The
//! engine-facing side only serializes and enqueues; a background writer task
//! owns the file. Call [`JsonlEventSink::finish`] to drain it.
//! [`read_step_logs`] reads such a file back, e.g. to build
//! `existingSteps` for a resume or to render `flowline inspect`.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use flowline_core::capability::event::StepEventSink;
use flowline_types::execution::ExecutionStepLog;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::InfraError;

/// Must be created inside a Tokio runtime.
pub struct JsonlEventSink {
    path: PathBuf,
    sender: Mutex<Option<mpsc::UnboundedSender<String>>>,
    writer: Mutex<Option<JoinHandle<std::io::Result<()>>>>,
}

impl JsonlEventSink {
    /// Create (or truncate) `path`.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, InfraError> {
        let path = path.into();
        let file = File::create(&path)?;
        Ok(Self::spawn(path, file))
    }

    /// Open `path` for appending, creating it if needed.
    pub fn append(path: impl Into<PathBuf>) -> Result<Self, InfraError> {
        let path = path.into();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self::spawn(path, file))
    }

    fn spawn(path: PathBuf, file: File) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<String>();
        let writer = tokio::spawn(async move {
            let mut out = BufWriter::new(tokio::fs::File::from_std(file));
            while let Some(line) = receiver.recv().await {
                out.write_all(line.as_bytes()).await?;
                out.write_all(b"\n").await?;
                if receiver.is_empty() {
                    out.flush().await?;
                }
            }
            out.flush().await
        });
        Self {
            path,
            sender: Mutex::new(Some(sender)),
            writer: Mutex::new(Some(writer)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stop accepting events and wait until every queued line is on disk.
    /// Later events are dropped with a warning.
    pub async fn finish(&self) -> Result<(), InfraError> {
        drop(self.sender.lock().ok().and_then(|mut sender| sender.take()));
        let writer = self.writer.lock().ok().and_then(|mut writer| writer.take());
        if let Some(handle) = writer {
            handle.await.map_err(std::io::Error::other)??;
        }
        Ok(())
    }

    fn enqueue(&self, log: &ExecutionStepLog) -> Result<(), InfraError> {
        let line = serde_json::to_string(log).map_err(std::io::Error::other)?;
        let sender = self
            .sender
            .lock()
            .map_err(|_| std::io::Error::other("event log sender poisoned"))?;
        sender
            .as_ref()
            .ok_or_else(|| std::io::Error::other("event log already finished"))?
            .send(line)
            .map_err(|_| std::io::Error::other("event log writer stopped"))?;
        Ok(())
    }
}

impl StepEventSink for JsonlEventSink {
    fn on_step_event(&self, log: &ExecutionStepLog) {
        if let Err(e) = self.enqueue(log) {
            tracing::warn!(path = %self.path.display(), step_id = %log.step_id, error = %e, "failed to persist step event");
        }
    }
}

/// Read step logs written by [`JsonlEventSink`]. Blank lines are skipped.
pub async fn read_step_logs(path: &Path) -> Result<Vec<ExecutionStepLog>, InfraError> {
    let content = tokio::fs::read_to_string(path).await?;
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line).map_err(|e| InfraError::EventLog {
                path: path.display().to_string(),
                line: index + 1,
                message: e.to_string(),
            })
        })
        .collect()
}
