//! Log-derived statistics.
//!
//! Indices repeat across retry passes, so every reconstruction here
//! dedups by step index with the most recent record winning. Append
//! position, not timestamps, defines recency.

use std::collections::HashMap;

use windlass_core::{ExecutionLog, ExecutionRecord, ExecutionStats, LIST_TO_END, LogEntry, Result, RunId};

/// Rebuilds run-wide statistics from the full log: one slot per step
/// index, latest record wins, retry markers excluded from the counts.
///
/// # Errors
/// Returns an error if the log cannot be read.
pub async fn rebuild_global_stats(log: &dyn ExecutionLog, run: RunId) -> Result<ExecutionStats> {
    let entries = log.list(run, 0, LIST_TO_END).await?;
    Ok(stats_from_entries(&entries))
}

/// Computes deduped statistics from a slice of log entries.
pub fn stats_from_entries(entries: &[LogEntry]) -> ExecutionStats {
    let latest = latest_by_index(entries);
    let succeeded = latest.values().filter(|record| record.result.success).count();
    ExecutionStats {
        attempted: latest.len(),
        succeeded,
        used_entries: entries.len(),
    }
}

/// Maps each step index to its most recent record. Later entries
/// overwrite earlier ones for the same index.
pub fn latest_by_index(entries: &[LogEntry]) -> HashMap<usize, &ExecutionRecord> {
    let mut latest = HashMap::new();
    for entry in entries {
        if let Some(record) = entry.as_step() {
            latest.insert(record.step_index, record);
        }
    }
    latest
}

/// Whether any retry pass has been recorded for this set of entries.
pub fn has_retry_marker(entries: &[LogEntry]) -> bool {
    entries
        .iter()
        .any(|entry| matches!(entry, LogEntry::RetryMarker { .. }))
}
