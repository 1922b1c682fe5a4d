//! Execution log boundary.
//!
//! The log is the only shared mutable resource across concurrent step
//! tasks: appends are whole-entry operations and reads are point-in-time
//! consistent. Across retry passes, "most recent record per index" is the
//! sole mechanism establishing current truth despite duplicate indices.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::record::LogEntry;

/// Unique identifier for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl Default for RunId {
    fn default() -> Self {
        Self(Uuid::new_v4())
    }
}

impl RunId {
    /// Creates a fresh random run identifier.
    pub fn new() -> Self {
        Self::default()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Sentinel for [`ExecutionLog::list`] meaning "to the end".
pub const LIST_TO_END: i64 = -1;

/// Append-only ordered record store, keyed by run.
#[async_trait]
pub trait ExecutionLog: Send + Sync {
    /// Appends one entry to the run's log.
    ///
    /// # Errors
    /// Returns an error if the store rejects the append.
    async fn append(&self, run: RunId, entry: LogEntry) -> Result<()>;

    /// Lists entries `from..to` (by position, in append order) for a run.
    /// `to = -1` means "to the end". Out-of-range bounds are clamped.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read.
    async fn list(&self, run: RunId, from: usize, to: i64) -> Result<Vec<LogEntry>>;
}
