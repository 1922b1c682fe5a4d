//! Run coordination: plan, execute, evaluate, repair, reflect.
//!
//! The coordinator owns the full lifecycle of one run and emits the event
//! sequence consumers observe: `PlanReady`, `ToolResult` per attempt,
//! `Evaluation`, the retry pair per repair pass, the reflection triplet,
//! and a terminal `Done`, or `RunFailed` when planning itself fails and
//! no step was ever attempted.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info};

use windlass_core::{
    CancelToken, Error, EvaluationVerdict, ExecutionLog, ExecutionStats, Plan, ReflectionVerdict,
    Result, RunChannel, RunConfig, RunEvent, RunId,
};
use windlass_oracle::{DecisionOracle, OracleSession};
use windlass_tooling::{ToolInvoker, ToolRegistry};

use crate::analyzer::validate_plan;
use crate::evaluator::Evaluator;
use crate::lease::LeaseRegistry;
use crate::reflection::ReflectionEngine;
use crate::retry::RetryController;
use crate::scheduler::Scheduler;
use crate::stats::rebuild_global_stats;

/// Final outcome of a coordinated run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// ID of the run.
    pub run_id: RunId,
    /// Final accepted evaluation verdict.
    pub verdict: EvaluationVerdict,
    /// Reflection verdict, when the pass ran.
    pub reflection: Option<ReflectionVerdict>,
    /// Global stats over the whole run, supplements included.
    pub stats: ExecutionStats,
    /// Wall-clock duration of the run in milliseconds.
    pub duration_ms: u64,
}

/// Drives one run end to end against a tool registry and an oracle.
pub struct RunCoordinator {
    session: Arc<OracleSession>,
    registry: ToolRegistry,
    log: Arc<dyn ExecutionLog>,
    leases: LeaseRegistry,
    config: RunConfig,
    channel: RunChannel,
    cancel: CancelToken,
}

impl RunCoordinator {
    /// Creates a coordinator over an oracle and a tool registry.
    #[must_use]
    pub fn new(
        oracle: Arc<dyn DecisionOracle>,
        registry: ToolRegistry,
        log: Arc<dyn ExecutionLog>,
        config: RunConfig,
        channel: RunChannel,
    ) -> Self {
        let session = Arc::new(OracleSession::new(oracle, config.oracle_retry_limit));
        Self {
            session,
            registry,
            log,
            leases: LeaseRegistry::new(),
            config,
            channel,
            cancel: CancelToken::new(),
        }
    }

    /// Shares a lease registry across coordinators so concurrent runs for
    /// the same conversation key exclude each other process-wide.
    #[must_use]
    pub fn with_lease_registry(mut self, leases: LeaseRegistry) -> Self {
        self.leases = leases;
        self
    }

    /// Token for cancelling this coordinator's runs cooperatively.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Executes one run for a conversation key.
    ///
    /// The lease for `key` is held for the whole run and released on every
    /// exit path. Planning failures emit `RunFailed`; once at least one
    /// step has been attempted, errors propagate without a terminal event
    /// and the log keeps whatever was recorded.
    ///
    /// # Errors
    /// Returns [`Error::LeaseHeld`] when a run is already active for the
    /// key, [`Error::Cancelled`] on cooperative cancellation, or any
    /// planning, execution, or log error.
    pub async fn run(&self, key: &str, objective: &str) -> Result<RunSummary> {
        let started = Instant::now();
        let run_id = RunId::new();
        let _lease = self.leases.acquire(key, run_id)?;
        info!("Starting run {run_id} for '{key}'");

        let plan = match self.request_plan(objective).await {
            Ok(plan) => plan,
            Err(error) => {
                error!("Run {run_id} failed before execution: {error}");
                self.channel.send(RunEvent::RunFailed {
                    run_id,
                    reason: error.to_string(),
                });
                return Err(error);
            }
        };
        self.channel.send(RunEvent::PlanReady {
            run_id,
            plan: Box::new(plan.clone()),
        });

        self.execute_and_settle(run_id, objective, &plan, started).await
    }

    /// Requests a plan and validates both its shape and that every named
    /// tool actually exists in the registry.
    async fn request_plan(&self, objective: &str) -> Result<Plan> {
        let catalog = self.registry.catalog();
        let plan = self.session.request_plan(objective, &catalog).await?;
        validate_plan(&plan)?;
        for step in &plan.steps {
            if !self.registry.has_tool(&step.tool_name) {
                return Err(Error::InvalidPlan(format!(
                    "step {} names unknown tool '{}'",
                    step.index, step.tool_name
                )));
            }
        }
        Ok(plan)
    }

    /// Everything after planning: execution, evaluation, repair,
    /// reflection, and the terminal event.
    async fn execute_and_settle(
        &self,
        run_id: RunId,
        objective: &str,
        plan: &Plan,
        started: Instant,
    ) -> Result<RunSummary> {
        let invoker = ToolInvoker::new(
            self.registry.clone(),
            Duration::from_millis(self.config.tool_timeout_ms),
        );
        let refiner = self
            .config
            .refine_arguments
            .then(|| Arc::clone(&self.session));
        let scheduler = Arc::new(Scheduler::new(
            invoker,
            refiner,
            Arc::clone(&self.log),
            self.channel.clone(),
            self.cancel.clone(),
        ));
        let evaluator = Arc::new(Evaluator::new(
            Arc::clone(&self.session),
            Arc::clone(&self.log),
            self.channel.clone(),
            self.config.evaluation_window,
        ));

        scheduler.execute(run_id, plan, None).await?;
        let mut verdict = evaluator.evaluate(run_id, objective, plan).await?;

        if !verdict.success {
            let controller = RetryController::new(
                Arc::clone(&scheduler),
                Arc::clone(&evaluator),
                Arc::clone(&self.log),
                self.channel.clone(),
                self.config.max_repair_attempts,
            );
            verdict = controller
                .run_with_repair(run_id, objective, plan, verdict)
                .await?;
        }

        let reflection = if self.config.reflection_enabled {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let engine = ReflectionEngine::new(
                Arc::clone(&self.session),
                Arc::clone(&scheduler),
                Arc::clone(&self.log),
                self.channel.clone(),
                self.config.max_supplements,
            );
            let catalog = self.registry.catalog();
            let (reflection_verdict, _stats) =
                engine.reflect(run_id, objective, plan, &catalog).await?;
            Some(reflection_verdict)
        } else {
            None
        };

        let stats = rebuild_global_stats(self.log.as_ref(), run_id).await?;
        info!(
            "Run {run_id} done: success={}, {}/{} steps succeeded",
            verdict.success, stats.succeeded, stats.attempted
        );
        self.channel.send(RunEvent::Done {
            run_id,
            stats: stats.clone(),
            verdict: Box::new(verdict.clone()),
        });

        Ok(RunSummary {
            run_id,
            verdict,
            reflection,
            stats,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }
}
