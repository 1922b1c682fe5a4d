//! Execution engine for the Windlass plan-execution core.
//!
//! Takes a validated plan through the full lifecycle: dependency-aware
//! wavefront scheduling, dual-axis evaluation, a bounded repair loop that
//! retries failed steps together with everything downstream of them, and a
//! single post-hoc reflection pass. The [`RunCoordinator`] drives the
//! sequence and emits lifecycle events along the way.

/// Dependency closure computation and plan validation.
pub mod analyzer;
/// Run coordination across all lifecycle stages.
pub mod coordinator;
/// Dual-axis run evaluation.
pub mod evaluator;
/// Per-conversation run leases.
pub mod lease;
/// In-memory execution log.
pub mod log;
/// Post-hoc completeness reflection.
pub mod reflection;
/// Bounded dependency-aware repair loop.
pub mod retry;
/// Dependency-aware wavefront scheduler.
pub mod scheduler;
/// Log-derived statistics.
pub mod stats;

pub use analyzer::{dependency_closure, validate_plan};
pub use coordinator::{RunCoordinator, RunSummary};
pub use evaluator::Evaluator;
pub use lease::{LeaseGuard, LeaseRegistry};
pub use log::MemoryExecutionLog;
pub use reflection::ReflectionEngine;
pub use retry::RetryController;
pub use scheduler::{PassReport, Scheduler};
pub use stats::rebuild_global_stats;
