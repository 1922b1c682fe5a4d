//! Bounded dependency-aware repair loop.
//!
//! Each pass re-executes the steps the evaluator flagged plus everything
//! transitively depending on them. A stale downstream result is as wrong
//! as the failure that produced it, so the chain always travels together.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{info, warn};

use windlass_core::{
    EvaluationVerdict, ExecutionLog, LogEntry, Plan, Result, RetryState, RunChannel, RunEvent,
    RunId,
};

use crate::analyzer::dependency_closure;
use crate::evaluator::Evaluator;
use crate::scheduler::Scheduler;
use crate::stats::rebuild_global_stats;

/// Drives repair passes until the verdict is successful or the attempt
/// budget runs out.
pub struct RetryController {
    scheduler: Arc<Scheduler>,
    evaluator: Arc<Evaluator>,
    log: Arc<dyn ExecutionLog>,
    channel: RunChannel,
    max_attempts: usize,
}

impl RetryController {
    /// Creates a controller with the given repair budget.
    #[must_use]
    pub fn new(
        scheduler: Arc<Scheduler>,
        evaluator: Arc<Evaluator>,
        log: Arc<dyn ExecutionLog>,
        channel: RunChannel,
        max_attempts: usize,
    ) -> Self {
        Self {
            scheduler,
            evaluator,
            log,
            channel,
            max_attempts,
        }
    }

    /// Runs repair passes starting from an already-failed verdict.
    ///
    /// Returns the final accepted verdict, which may still be a failure if
    /// the budget ran out. Indices the evaluator names that do not exist in
    /// the plan are dropped; if nothing actionable remains, the verdict is
    /// returned as-is.
    ///
    /// # Errors
    /// Returns an error if a pass fails to execute, the log fails, or a
    /// re-evaluation exhausts the oracle.
    pub async fn run_with_repair(
        &self,
        run: RunId,
        objective: &str,
        plan: &Plan,
        initial: EvaluationVerdict,
    ) -> Result<EvaluationVerdict> {
        let mut verdict = initial;
        let mut attempt = 0;

        while !verdict.success && attempt < self.max_attempts {
            let failed_indices: BTreeSet<usize> = verdict
                .failed_indices()
                .into_iter()
                .filter(|index| *index < plan.len())
                .collect();

            if failed_indices.is_empty() {
                warn!("Verdict for run {run} names no step present in the plan; cannot repair");
                break;
            }

            attempt += 1;
            let retry_chain = dependency_closure(&plan.steps, &failed_indices);
            info!(
                "Repair pass {attempt}/{} for run {run}: {} failed, chain of {}",
                self.max_attempts,
                failed_indices.len(),
                retry_chain.len()
            );

            let state = RetryState {
                attempt,
                max_attempts: self.max_attempts,
                failed_indices,
                retry_chain: retry_chain.clone(),
            };
            self.channel.send(RunEvent::RetryBegin {
                run_id: run,
                state: state.clone(),
            });

            self.scheduler.execute(run, plan, Some(&retry_chain)).await?;
            self.log
                .append(run, LogEntry::retry_marker(attempt, retry_chain))
                .await?;

            let stats = rebuild_global_stats(self.log.as_ref(), run).await?;
            self.channel.send(RunEvent::RetryDone {
                run_id: run,
                state,
                stats,
            });

            verdict = self.evaluator.evaluate(run, objective, plan).await?;
        }

        Ok(verdict)
    }
}
