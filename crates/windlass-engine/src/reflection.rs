//! Post-hoc completeness reflection.
//!
//! Runs exactly once, after the repair loop has settled. The oracle judges
//! whether the executed steps actually cover the objective and may propose
//! a bounded set of supplemental actions; supplements bound to a tool are
//! appended to the plan and executed as one extra scoped pass.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{info, warn};

use windlass_core::{
    ExecutionLog, ExecutionRecord, ExecutionStats, LIST_TO_END, Plan, PlanStep, ReflectionVerdict,
    Result, RunChannel, RunEvent, RunId,
};
use windlass_oracle::OracleSession;

use crate::scheduler::Scheduler;
use crate::stats::latest_by_index;

/// One-shot completeness check with optional supplemental execution.
pub struct ReflectionEngine {
    session: Arc<OracleSession>,
    scheduler: Arc<Scheduler>,
    log: Arc<dyn ExecutionLog>,
    channel: RunChannel,
    max_supplements: usize,
}

impl ReflectionEngine {
    /// Creates a reflection pass with the given supplement cap.
    #[must_use]
    pub fn new(
        session: Arc<OracleSession>,
        scheduler: Arc<Scheduler>,
        log: Arc<dyn ExecutionLog>,
        channel: RunChannel,
        max_supplements: usize,
    ) -> Self {
        Self {
            session,
            scheduler,
            log,
            channel,
            max_supplements,
        }
    }

    /// Asks the oracle whether the run covers its objective, executing any
    /// tool-bound supplements it proposes.
    ///
    /// A supplement naming a tool absent from the catalog keeps its
    /// advisory text but loses the binding, so it is never executed.
    /// Returns the verdict alongside stats over the supplemental pass, if
    /// one ran.
    ///
    /// # Errors
    /// Returns an error if the oracle fails past its re-prompt budget, the
    /// log fails, or the supplemental pass cannot execute.
    pub async fn reflect(
        &self,
        run: RunId,
        objective: &str,
        plan: &Plan,
        catalog: &[String],
    ) -> Result<(ReflectionVerdict, Option<ExecutionStats>)> {
        let latest = self.latest_records(run).await?;
        let mut verdict = self
            .session
            .request_reflection(objective, plan, &latest, catalog, self.max_supplements)
            .await?;

        for supplement in &mut verdict.supplements {
            if let Some(tool_name) = &supplement.suggested_tool
                && !catalog.iter().any(|known| known == tool_name)
            {
                warn!("Reflection suggested unknown tool '{tool_name}'; dropping the binding");
                supplement.suggested_tool = None;
            }
        }

        info!(
            "Run {run} reflection: complete={}, {} missing aspects, {} supplements",
            verdict.is_complete,
            verdict.missing_aspects.len(),
            verdict.supplements.len()
        );
        self.channel.send(RunEvent::Reflection {
            run_id: run,
            verdict: Box::new(verdict.clone()),
        });

        if verdict.is_complete {
            return Ok((verdict, None));
        }

        let Some((combined, supplemental_indices)) = extend_with_supplements(plan, &verdict) else {
            return Ok((verdict, None));
        };

        let supplemental_steps: Vec<PlanStep> = supplemental_indices
            .iter()
            .map(|index| combined.steps[*index].clone())
            .collect();
        self.channel.send(RunEvent::ReflectionPlan {
            run_id: run,
            plan: Box::new(Plan::new(
                format!("supplements for: {}", plan.overview),
                supplemental_steps,
            )),
        });

        let report = self
            .scheduler
            .execute(run, &combined, Some(&supplemental_indices))
            .await?;

        self.channel.send(RunEvent::ReflectionExec {
            run_id: run,
            stats: report.stats.clone(),
        });
        Ok((verdict, Some(report.stats)))
    }

    /// Current-truth records, one per step index, in index order.
    async fn latest_records(&self, run: RunId) -> Result<Vec<ExecutionRecord>> {
        let entries = self.log.list(run, 0, LIST_TO_END).await?;
        let mut latest: Vec<_> = latest_by_index(&entries)
            .into_iter()
            .map(|(_, record)| record.clone())
            .collect();
        latest.sort_by_key(|record| record.step_index);
        Ok(latest)
    }
}

/// Appends one step per tool-bound supplement, returning the combined plan
/// and the indices of the appended steps. `None` when nothing is bound.
fn extend_with_supplements(
    plan: &Plan,
    verdict: &ReflectionVerdict,
) -> Option<(Plan, BTreeSet<usize>)> {
    let mut combined = plan.clone();
    let mut supplemental_indices = BTreeSet::new();

    for supplement in &verdict.supplements {
        let Some(tool_name) = &supplement.suggested_tool else {
            continue;
        };
        // Draft arguments stay null: the supplement's action is carried in
        // the reasons, where an argument-refining session can see it. A
        // tool with no required parameters runs fine without refinement.
        let index = combined.len();
        combined.steps.push(PlanStep::new(index, tool_name.clone()).with_reasons(vec![
            supplement.action.clone(),
            supplement.rationale.clone(),
        ]));
        supplemental_indices.insert(index);
    }

    if supplemental_indices.is_empty() {
        None
    } else {
        Some((combined, supplemental_indices))
    }
}
