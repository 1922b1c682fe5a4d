//! Step results, execution records, and per-pass statistics.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Classification of a step result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultCode {
    /// The invocation completed and the tool reported success.
    Ok,
    /// The request was malformed; surfaced immediately, never retried.
    Invalid,
    /// The tool did not answer within its deadline.
    Timeout,
    /// The tool failed or threw; handled by the normal retry loop.
    Error,
    /// Synthesized without invoking the tool because a declared dependency
    /// had already failed in the current retry pass. Never retried
    /// directly; only resolved by retrying its upstream dependency.
    SkipUpstreamFailed,
    /// The oracle produced output violating its schema; recovered at the
    /// oracle boundary, not here.
    ParseFailed,
}

impl fmt::Display for ResultCode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Ok => "OK",
            Self::Invalid => "INVALID",
            Self::Timeout => "TIMEOUT",
            Self::Error => "ERROR",
            Self::SkipUpstreamFailed => "SKIP_UPSTREAM_FAILED",
            Self::ParseFailed => "PARSE_FAILED",
        };
        write!(formatter, "{label}")
    }
}

/// Outcome of one step attempt, produced by the tool invoker or synthesized
/// by the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    /// Whether the attempt succeeded.
    pub success: bool,
    /// Result classification.
    pub code: ResultCode,
    /// Human-readable message describing the result.
    pub message: String,
    /// Optional structured payload returned by the tool.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl StepResult {
    /// Creates a successful result.
    pub fn ok(message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            success: true,
            code: ResultCode::Ok,
            message: message.into(),
            data,
        }
    }

    /// Creates a failed result with the given classification.
    pub fn failure(code: ResultCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Creates the synthetic result recorded when a step is skipped because
    /// one of its dependencies failed.
    pub fn skipped_upstream(message: impl Into<String>) -> Self {
        Self::failure(ResultCode::SkipUpstreamFailed, message)
    }
}

/// Immutable log entry for one step attempt.
///
/// Multiple records may exist per index across retry passes; the most
/// recent one is the current truth for that index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Index of the attempted step.
    pub step_index: usize,
    /// Tool the step invoked (or would have invoked, for skips).
    pub tool_name: String,
    /// Arguments passed to the tool.
    pub arguments: Value,
    /// Result of the attempt.
    pub result: StepResult,
    /// Unix timestamp in milliseconds when the record was created.
    pub timestamp_ms: i64,
}

impl ExecutionRecord {
    /// Creates a record stamped with the current time.
    pub fn new(step_index: usize, tool_name: impl Into<String>, arguments: Value, result: StepResult) -> Self {
        Self {
            step_index,
            tool_name: tool_name.into(),
            arguments,
            result,
            timestamp_ms: Utc::now().timestamp_millis(),
        }
    }
}

/// One entry in the append-only execution log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogEntry {
    /// A step attempt.
    Step(ExecutionRecord),
    /// Marker appended after each repair pass; its presence disables the
    /// evaluator's all-succeeded shortcut.
    RetryMarker {
        /// Repair attempt number (1-based).
        attempt: usize,
        /// Indices that were re-executed in this pass.
        indices: BTreeSet<usize>,
        /// Unix timestamp in milliseconds.
        timestamp_ms: i64,
    },
}

impl LogEntry {
    /// Creates a retry-pass marker stamped with the current time.
    pub fn retry_marker(attempt: usize, indices: BTreeSet<usize>) -> Self {
        Self::RetryMarker {
            attempt,
            indices,
            timestamp_ms: Utc::now().timestamp_millis(),
        }
    }

    /// Returns the step record if this entry is one.
    pub fn as_step(&self) -> Option<&ExecutionRecord> {
        match self {
            Self::Step(record) => Some(record),
            Self::RetryMarker { .. } => None,
        }
    }
}

/// Statistics over attempted steps: either a fresh single-pass count or a
/// global reconstruction from the log (dedup by index, latest wins).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionStats {
    /// Number of distinct steps attempted (skips count as attempted).
    pub attempted: usize,
    /// Number of distinct steps whose current-truth result succeeded.
    pub succeeded: usize,
    /// Number of log entries this count was derived from.
    pub used_entries: usize,
}

impl ExecutionStats {
    /// Fraction of attempted steps that succeeded, in `0.0..=1.0`.
    pub fn success_rate(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.succeeded as f64 / self.attempted as f64
        }
    }

    /// Whether every attempted step succeeded (and at least one ran).
    pub fn all_succeeded(&self) -> bool {
        self.attempted > 0 && self.attempted == self.succeeded
    }
}

/// Terminal outcome of a step within a single execution pass.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// Whether the step's most recent attempt succeeded.
    pub success: bool,
    /// Short reason, taken from the result message.
    pub reason: String,
}

/// Per-pass terminal status, keyed by step index. Scoped to a single
/// scheduler pass and discarded after it.
pub type StepStatusMap = HashMap<usize, StepOutcome>;
