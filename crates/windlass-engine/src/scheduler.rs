//! Dependency-aware wavefront scheduler.
//!
//! Execution proceeds in wavefronts: every step whose dependencies are
//! terminal is spawned concurrently, the whole wavefront is joined, and
//! only then is readiness recomputed. A full run executes every step; a
//! scoped pass executes only the requested indices, seeding the status of
//! everything else from the log so dependency gating still sees it.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use windlass_core::{
    CancelToken, Error, ExecutionLog, ExecutionRecord, ExecutionStats, LIST_TO_END, LogEntry,
    Plan, PlanStep, Result, ResultCode, RunChannel, RunEvent, RunId, StepOutcome, StepResult,
    StepStatusMap,
};
use windlass_oracle::OracleSession;
use windlass_tooling::ToolInvoker;

use crate::stats::latest_by_index;

/// Work handed to one spawned step task.
struct StepTask {
    run: RunId,
    step: PlanStep,
    dependency_records: Vec<ExecutionRecord>,
    invoker: ToolInvoker,
    refiner: Option<Arc<OracleSession>>,
}

impl StepTask {
    /// Refines arguments through the oracle when a refiner is attached,
    /// falling back to the plan's draft on any refinement failure. A bad
    /// refinement must not sink a step the draft could have carried.
    async fn resolve_arguments(&self) -> Value {
        let Some(refiner) = &self.refiner else {
            return self.step.draft_arguments.clone();
        };

        match refiner
            .request_arguments(&self.step, &self.dependency_records)
            .await
        {
            Ok(refined) => refined.arguments,
            Err(error) => {
                warn!(
                    "Argument refinement for step {} failed, using draft: {error}",
                    self.step.index
                );
                self.step.draft_arguments.clone()
            }
        }
    }

    async fn run(self) -> ExecutionRecord {
        let arguments = self.resolve_arguments().await;
        debug!(
            "Invoking '{}' for step {} of run {}",
            self.step.tool_name, self.step.index, self.run
        );
        let result = self.invoker.invoke(&self.step.tool_name, &arguments).await;
        ExecutionRecord::new(self.step.index, &self.step.tool_name, arguments, result)
    }
}

/// Outcome of one scheduler pass.
pub struct PassReport {
    /// Terminal status per step: everything executed this pass plus, in
    /// scoped mode, the statuses seeded from the log.
    pub statuses: StepStatusMap,
    /// Stats over the steps this pass actually attempted.
    pub stats: ExecutionStats,
}

/// Executes plan steps against the tool registry, recording every attempt.
pub struct Scheduler {
    invoker: ToolInvoker,
    refiner: Option<Arc<OracleSession>>,
    log: Arc<dyn ExecutionLog>,
    channel: RunChannel,
    cancel: CancelToken,
}

impl Scheduler {
    /// Creates a scheduler. Pass a refiner session to have the oracle
    /// finalize each step's arguments just before invocation; without one,
    /// draft arguments are used as-is.
    #[must_use]
    pub fn new(
        invoker: ToolInvoker,
        refiner: Option<Arc<OracleSession>>,
        log: Arc<dyn ExecutionLog>,
        channel: RunChannel,
        cancel: CancelToken,
    ) -> Self {
        Self {
            invoker,
            refiner,
            log,
            channel,
            cancel,
        }
    }

    /// Executes the plan, or just the scoped indices when `scope` is given.
    ///
    /// Scoped passes synthesize `SKIP_UPSTREAM_FAILED` for steps whose
    /// dependencies are currently failed; a full run never skips, because a
    /// first attempt is owed to every step regardless of upstream outcomes.
    ///
    /// # Errors
    /// Returns [`Error::Cancelled`] if cancellation is observed between
    /// wavefronts, or an error if the log fails or readiness stalls.
    pub async fn execute(
        &self,
        run: RunId,
        plan: &Plan,
        scope: Option<&BTreeSet<usize>>,
    ) -> Result<PassReport> {
        let targets: BTreeSet<usize> = match scope {
            Some(indices) => indices.clone(),
            None => plan.steps.iter().map(|step| step.index).collect(),
        };

        let mut statuses = if scope.is_some() {
            self.seed_statuses(run, &targets).await?
        } else {
            StepStatusMap::new()
        };

        let mut pending: BTreeSet<usize> = targets.clone();

        while !pending.is_empty() {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let wavefront = ready_steps(plan, &pending, &statuses);
            if wavefront.is_empty() {
                return Err(Error::Other(format!(
                    "execution stalled: {} steps pending but none ready: {pending:?}",
                    pending.len()
                )));
            }

            self.run_wavefront(run, plan, &wavefront, &mut statuses, scope.is_some())
                .await?;

            for index in &wavefront {
                pending.remove(index);
            }
        }

        let succeeded = targets
            .iter()
            .filter(|index| statuses.get(index).is_some_and(|outcome| outcome.success))
            .count();
        let stats = ExecutionStats {
            attempted: targets.len(),
            succeeded,
            used_entries: targets.len(),
        };

        Ok(PassReport { statuses, stats })
    }

    /// Spawns one wavefront, joins it fully, and records every result.
    async fn run_wavefront(
        &self,
        run: RunId,
        plan: &Plan,
        wavefront: &BTreeSet<usize>,
        statuses: &mut StepStatusMap,
        skip_on_upstream_failure: bool,
    ) -> Result<()> {
        let mut join_set: JoinSet<ExecutionRecord> = JoinSet::new();

        for index in wavefront {
            let step = &plan.steps[*index];

            if skip_on_upstream_failure {
                let failed = failed_dependencies(step, statuses);
                if !failed.is_empty() {
                    let record = ExecutionRecord::new(
                        step.index,
                        &step.tool_name,
                        step.draft_arguments.clone(),
                        StepResult::skipped_upstream(format!(
                            "dependencies {failed:?} failed; not attempting"
                        )),
                    );
                    self.record(run, record, statuses).await?;
                    continue;
                }
            }

            let dependency_records = step
                .depends_on
                .iter()
                .filter_map(|dependency| {
                    statuses
                        .get(dependency)
                        .map(|outcome| dependency_record(plan, *dependency, outcome))
                })
                .collect();

            join_set.spawn(
                StepTask {
                    run,
                    step: step.clone(),
                    dependency_records,
                    invoker: self.invoker.clone(),
                    refiner: self.refiner.as_ref().map(Arc::clone),
                }
                .run(),
            );
        }

        while let Some(joined) = join_set.join_next().await {
            let record = joined.map_err(|error| Error::TaskJoin(error.to_string()))?;
            self.record(run, record, statuses).await?;
        }

        Ok(())
    }

    /// Appends a record, updates the status map, and emits the event.
    async fn record(
        &self,
        run: RunId,
        record: ExecutionRecord,
        statuses: &mut StepStatusMap,
    ) -> Result<()> {
        statuses.insert(
            record.step_index,
            StepOutcome {
                success: record.result.success,
                reason: record.result.message.clone(),
            },
        );
        self.log.append(run, LogEntry::Step(record.clone())).await?;
        self.channel.send(RunEvent::ToolResult {
            run_id: run,
            record: Box::new(record),
        });
        Ok(())
    }

    /// Builds the initial status map for a scoped pass: the latest log
    /// record of every step outside the scope becomes its seeded status.
    async fn seed_statuses(&self, run: RunId, targets: &BTreeSet<usize>) -> Result<StepStatusMap> {
        let entries = self.log.list(run, 0, LIST_TO_END).await?;
        let latest = latest_by_index(&entries);

        let mut statuses = StepStatusMap::new();
        for (index, record) in latest {
            if !targets.contains(&index) {
                statuses.insert(
                    index,
                    StepOutcome {
                        success: record.result.success,
                        reason: record.result.message.clone(),
                    },
                );
            }
        }
        Ok(statuses)
    }

}

/// Reconstructs a lightweight record for a terminal dependency so the
/// refiner can see upstream outcomes. Only the status map survives a pass,
/// so the record carries the outcome, not the original payload.
fn dependency_record(plan: &Plan, index: usize, outcome: &StepOutcome) -> ExecutionRecord {
    let result = if outcome.success {
        StepResult::ok(outcome.reason.clone(), None)
    } else {
        StepResult::failure(ResultCode::Error, outcome.reason.clone())
    };
    let tool_name = plan
        .steps
        .get(index)
        .map_or("unknown", |step| step.tool_name.as_str());
    ExecutionRecord::new(index, tool_name, Value::Null, result)
}

/// Steps in `pending` whose dependencies are all terminal. Terminal means
/// "has a status": produced by an earlier wavefront of this pass, or seeded
/// from the log for steps outside a scoped pass. A dependency that can
/// never gain a status leaves its dependents pending forever, which the
/// stall check in the wavefront loop surfaces as an error.
fn ready_steps(plan: &Plan, pending: &BTreeSet<usize>, statuses: &StepStatusMap) -> BTreeSet<usize> {
    pending
        .iter()
        .copied()
        .filter(|index| {
            plan.steps[*index]
                .depends_on
                .iter()
                .all(|dependency| statuses.contains_key(dependency))
        })
        .collect()
}

/// Dependencies of the step whose terminal status is a failure.
fn failed_dependencies(step: &PlanStep, statuses: &StepStatusMap) -> Vec<usize> {
    step.depends_on
        .iter()
        .copied()
        .filter(|dependency| statuses.get(dependency).is_some_and(|outcome| !outcome.success))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryExecutionLog;
    use std::time::Duration;
    use windlass_tooling::{MockTool, ScriptedOutcome, ToolRegistry};

    fn scheduler_with(
        tools: Vec<MockTool>,
        log: Arc<MemoryExecutionLog>,
        cancel: CancelToken,
    ) -> Scheduler {
        let mut registry = ToolRegistry::new();
        for tool in tools {
            registry = registry.with_tool(Arc::new(tool));
        }
        let invoker = ToolInvoker::new(registry, Duration::from_millis(500));
        let (channel, receiver) = RunChannel::new();
        // Consumers are optional; tests that care about events build their own channel.
        drop(receiver);
        Scheduler::new(invoker, None, log, channel, cancel)
    }

    fn diamond_plan() -> Plan {
        Plan::new(
            "diamond",
            vec![
                PlanStep::new(0, "echo"),
                PlanStep::new(1, "echo").with_dependency(0),
                PlanStep::new(2, "echo").with_dependency(0),
                PlanStep::new(3, "echo")
                    .with_dependency(1)
                    .with_dependency(2),
            ],
        )
    }

    #[tokio::test]
    async fn test_full_run_executes_every_step() {
        let log = Arc::new(MemoryExecutionLog::new());
        let scheduler = scheduler_with(
            vec![MockTool::new("echo")],
            Arc::clone(&log),
            CancelToken::new(),
        );
        let run = RunId::new();

        let report = scheduler.execute(run, &diamond_plan(), None).await.unwrap();

        assert_eq!(report.statuses.len(), 4);
        assert!(report.statuses.values().all(|outcome| outcome.success));
        assert_eq!(report.stats.attempted, 4);
        assert_eq!(report.stats.succeeded, 4);
        assert_eq!(log.len(run).await, 4);
    }

    #[tokio::test]
    async fn test_dependencies_run_before_dependents() {
        let log = Arc::new(MemoryExecutionLog::new());
        let scheduler = scheduler_with(
            vec![MockTool::new("echo")],
            Arc::clone(&log),
            CancelToken::new(),
        );
        let run = RunId::new();

        scheduler.execute(run, &diamond_plan(), None).await.unwrap();

        let entries = log.list(run, 0, LIST_TO_END).await.unwrap();
        let order: Vec<usize> = entries
            .iter()
            .filter_map(|entry| entry.as_step().map(|record| record.step_index))
            .collect();

        let position = |index: usize| order.iter().position(|step| *step == index).unwrap();
        assert!(position(0) < position(1));
        assert!(position(0) < position(2));
        assert!(position(1) < position(3));
        assert!(position(2) < position(3));
    }

    #[tokio::test]
    async fn test_full_run_attempts_dependents_of_failures() {
        let log = Arc::new(MemoryExecutionLog::new());
        let failing = MockTool::new("flaky").with_outcome(ScriptedOutcome::Fail("down".to_owned()));
        let observer = MockTool::new("echo");
        let dependent_observer = observer.clone();
        let scheduler = scheduler_with(vec![failing, observer], Arc::clone(&log), CancelToken::new());
        let run = RunId::new();

        let plan = Plan::new(
            "chain",
            vec![
                PlanStep::new(0, "flaky"),
                PlanStep::new(1, "echo").with_dependency(0),
            ],
        );
        let report = scheduler.execute(run, &plan, None).await.unwrap();

        // First attempts are owed even under a failed dependency.
        assert!(!report.statuses[&0].success);
        assert!(report.statuses[&1].success);
        assert_eq!(dependent_observer.call_count(), 1);
    }

    #[tokio::test]
    async fn test_scoped_pass_skips_on_failed_dependency_without_invoking() {
        let log = Arc::new(MemoryExecutionLog::new());
        let failing = MockTool::new("flaky").with_outcome(ScriptedOutcome::Fail("down".to_owned()));
        let observer = MockTool::new("echo");
        let skipped_observer = observer.clone();
        let scheduler = scheduler_with(vec![failing, observer], Arc::clone(&log), CancelToken::new());
        let run = RunId::new();

        let plan = Plan::new(
            "chain",
            vec![
                PlanStep::new(0, "flaky"),
                PlanStep::new(1, "echo").with_dependency(0),
            ],
        );
        let scope = BTreeSet::from([0, 1]);
        let report = scheduler.execute(run, &plan, Some(&scope)).await.unwrap();

        assert!(!report.statuses[&0].success);
        assert!(!report.statuses[&1].success);
        assert_eq!(skipped_observer.call_count(), 0);

        let entries = log.list(run, 0, LIST_TO_END).await.unwrap();
        let skip = entries
            .iter()
            .filter_map(LogEntry::as_step)
            .find(|record| record.step_index == 1)
            .unwrap();
        assert_eq!(skip.result.code, ResultCode::SkipUpstreamFailed);
    }

    #[tokio::test]
    async fn test_scoped_pass_seeds_statuses_from_log() {
        let log = Arc::new(MemoryExecutionLog::new());
        let run = RunId::new();

        // Step 0 already succeeded in an earlier pass.
        log.append(
            run,
            LogEntry::Step(ExecutionRecord::new(
                0,
                "echo",
                Value::Null,
                StepResult::ok("done earlier", None),
            )),
        )
        .await
        .unwrap();

        let scheduler = scheduler_with(
            vec![MockTool::new("echo")],
            Arc::clone(&log),
            CancelToken::new(),
        );
        let plan = Plan::new(
            "chain",
            vec![
                PlanStep::new(0, "echo"),
                PlanStep::new(1, "echo").with_dependency(0),
            ],
        );
        let scope = BTreeSet::from([1]);
        let report = scheduler.execute(run, &plan, Some(&scope)).await.unwrap();

        assert!(report.statuses[&0].success);
        assert!(report.statuses[&1].success);
        // Pass stats cover the scoped step only.
        assert_eq!(report.stats.attempted, 1);
        // Only step 1 ran this pass.
        assert_eq!(log.len(run).await, 2);
    }

    #[tokio::test]
    async fn test_cancellation_stops_before_next_wavefront() {
        let log = Arc::new(MemoryExecutionLog::new());
        let cancel = CancelToken::new();
        cancel.cancel();
        let scheduler = scheduler_with(vec![MockTool::new("echo")], Arc::clone(&log), cancel);
        let run = RunId::new();

        let result = scheduler.execute(run, &diamond_plan(), None).await;
        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(log.is_empty(run).await);
    }

    #[tokio::test]
    async fn test_panicking_tool_still_yields_a_record() {
        let log = Arc::new(MemoryExecutionLog::new());
        let bomb =
            MockTool::new("bomb").with_outcome(ScriptedOutcome::Panic("wires crossed".to_owned()));
        let survivor = MockTool::new("echo");
        let downstream = survivor.clone();
        let scheduler = scheduler_with(vec![bomb, survivor], Arc::clone(&log), CancelToken::new());
        let run = RunId::new();

        let plan = Plan::new(
            "bomb then echo",
            vec![
                PlanStep::new(0, "bomb"),
                PlanStep::new(1, "echo").with_dependency(0),
            ],
        );
        let report = scheduler.execute(run, &plan, None).await.unwrap();

        // The pass survives the panic with a failure record for the step.
        assert!(!report.statuses[&0].success);
        assert!(report.statuses[&1].success);
        assert_eq!(downstream.call_count(), 1);

        let entries = log.list(run, 0, LIST_TO_END).await.unwrap();
        let record = entries
            .iter()
            .filter_map(LogEntry::as_step)
            .find(|record| record.step_index == 0)
            .unwrap();
        assert_eq!(record.result.code, ResultCode::Error);
        assert!(record.result.message.contains("panicked"));
    }

    #[tokio::test]
    async fn test_unknown_tool_records_invalid_result() {
        let log = Arc::new(MemoryExecutionLog::new());
        let scheduler = scheduler_with(
            vec![MockTool::new("echo")],
            Arc::clone(&log),
            CancelToken::new(),
        );
        let run = RunId::new();

        let plan = Plan::new("missing tool", vec![PlanStep::new(0, "nope")]);
        let report = scheduler.execute(run, &plan, None).await.unwrap();

        assert!(!report.statuses[&0].success);
        let entries = log.list(run, 0, LIST_TO_END).await.unwrap();
        assert_eq!(
            entries[0].as_step().unwrap().result.code,
            ResultCode::Invalid
        );
    }
}
