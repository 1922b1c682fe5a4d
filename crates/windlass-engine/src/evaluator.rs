//! Dual-axis run evaluation.
//!
//! `success` and `incomplete` are independent judgments: the first asks
//! whether every attempted invocation completed without error, the second
//! whether the objective still has unmet sub-goals. The oracle is only
//! consulted when the log cannot answer the first axis by itself.

use std::sync::Arc;

use tracing::{debug, info};

use windlass_core::{
    EvaluationVerdict, ExecutionLog, ExecutionRecord, LIST_TO_END, LogEntry, Plan, Result,
    RunChannel, RunEvent, RunId,
};
use windlass_oracle::OracleSession;

use crate::stats::{has_retry_marker, stats_from_entries};

/// Judges a run against its objective from the execution log.
pub struct Evaluator {
    session: Arc<OracleSession>,
    log: Arc<dyn ExecutionLog>,
    channel: RunChannel,
    window: usize,
}

impl Evaluator {
    /// Creates an evaluator that shows the oracle at most `window` recent
    /// records per judgment.
    #[must_use]
    pub fn new(
        session: Arc<OracleSession>,
        log: Arc<dyn ExecutionLog>,
        channel: RunChannel,
        window: usize,
    ) -> Self {
        Self {
            session,
            log,
            channel,
            window,
        }
    }

    /// Produces an accepted verdict for the run and emits it.
    ///
    /// When every deduped step succeeded and no retry pass has occurred,
    /// the verdict is synthesized without consulting the oracle. A log
    /// containing retry markers always goes to the oracle: superseded
    /// failures need a judgment call, not a shortcut.
    ///
    /// # Errors
    /// Returns an error if the log cannot be read or the oracle fails past
    /// its corrective re-prompt budget.
    pub async fn evaluate(
        &self,
        run: RunId,
        objective: &str,
        plan: &Plan,
    ) -> Result<EvaluationVerdict> {
        let entries = self.log.list(run, 0, LIST_TO_END).await?;
        let stats = stats_from_entries(&entries);
        let retried = has_retry_marker(&entries);

        let verdict = if stats.all_succeeded() && !retried {
            debug!("Every step of run {run} succeeded on the first pass; skipping oracle");
            EvaluationVerdict::clean_success(format!(
                "All {} steps completed successfully.",
                stats.attempted
            ))
        } else {
            let window = recent_records(&entries, self.window);
            self.session
                .request_evaluation(objective, plan, &stats, &window, retried)
                .await?
        };

        info!(
            "Run {run} evaluated: success={}, incomplete={}, {} failed steps",
            verdict.success,
            verdict.incomplete,
            verdict.failed_steps.len()
        );
        self.channel.send(RunEvent::Evaluation {
            run_id: run,
            verdict: Box::new(verdict.clone()),
        });
        Ok(verdict)
    }
}

/// Most recent record per step, capped to the last `window` by recency;
/// markers excluded. A superseded attempt never reaches the oracle, so the
/// prompt's per-step claim holds even after a repair pass.
fn recent_records(entries: &[LogEntry], window: usize) -> Vec<ExecutionRecord> {
    let mut latest: Vec<&ExecutionRecord> = Vec::new();
    for record in entries.iter().filter_map(LogEntry::as_step) {
        latest.retain(|kept| kept.step_index != record.step_index);
        latest.push(record);
    }
    let start = latest.len().saturating_sub(window);
    latest[start..].iter().map(|record| (*record).clone()).collect()
}
