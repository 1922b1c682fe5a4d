//! Core types and boundaries for the Windlass plan-execution engine.
//!
//! This crate provides the shared data model (plans, step results, execution
//! records, verdicts), the error type, run configuration, the lifecycle event
//! channel, and the external boundary traits used across the workspace.

/// Run configuration with TOML loading.
pub mod config;
/// Error types and result definitions.
pub mod error;
/// Lifecycle event types and the run event channel.
pub mod events;
/// Execution log boundary trait and run identifiers.
pub mod log;
/// Plan and step data model.
pub mod plan;
/// Step results, execution records, and statistics.
pub mod record;
/// Cooperative cancellation.
pub mod sync;
/// Evaluation and reflection verdicts.
pub mod verdict;

pub use config::RunConfig;
pub use error::{Error, Result};
pub use events::{RunChannel, RunEvent};
pub use log::{ExecutionLog, LIST_TO_END, RunId};
pub use plan::{Plan, PlanStep};
pub use record::{
    ExecutionRecord, ExecutionStats, LogEntry, ResultCode, StepOutcome, StepResult, StepStatusMap,
};
pub use sync::{CancelToken, IgnoreLock};
pub use verdict::{EvaluationVerdict, FailedStep, ReflectionVerdict, RetryState, Supplement};
