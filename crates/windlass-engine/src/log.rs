//! In-memory execution log.
//!
//! Appends are whole-entry operations under one lock and reads copy a
//! point-in-time snapshot, which is all the consistency the scheduler
//! needs: a step's record lands strictly after every terminal record of
//! its dependencies because the step is not dispatched until those are
//! terminal.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use windlass_core::{ExecutionLog, LIST_TO_END, LogEntry, Result, RunId};

/// Append-only in-memory log store, keyed by run.
#[derive(Default)]
pub struct MemoryExecutionLog {
    entries: Mutex<HashMap<RunId, Vec<LogEntry>>>,
}

impl MemoryExecutionLog {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries recorded for a run.
    pub async fn len(&self, run: RunId) -> usize {
        let entries = self.entries.lock().await;
        entries.get(&run).map_or(0, Vec::len)
    }

    /// Whether a run has no entries.
    pub async fn is_empty(&self, run: RunId) -> bool {
        self.len(run).await == 0
    }
}

#[async_trait]
impl ExecutionLog for MemoryExecutionLog {
    async fn append(&self, run: RunId, entry: LogEntry) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.entry(run).or_default().push(entry);
        Ok(())
    }

    async fn list(&self, run: RunId, from: usize, to: i64) -> Result<Vec<LogEntry>> {
        let entries = self.entries.lock().await;
        let Some(run_entries) = entries.get(&run) else {
            return Ok(Vec::new());
        };

        let end = if to == LIST_TO_END {
            run_entries.len()
        } else {
            (to.max(0) as usize).min(run_entries.len())
        };
        let start = from.min(end);

        Ok(run_entries[start..end].to_vec())
    }
}
