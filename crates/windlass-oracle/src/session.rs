//! Bounded corrective re-prompt session.
//!
//! Each request decodes and schema-validates the oracle's response; a
//! malformed or invariant-violating payload triggers a corrective reminder
//! and a re-prompt, up to the configured limit, before the request is
//! treated as a hard failure at that stage. Transport errors are never
//! retried here; only content violations are.

use std::sync::Arc;

use tracing::{debug, warn};

use windlass_core::{
    Error, EvaluationVerdict, ExecutionRecord, ExecutionStats, Plan, PlanStep, ReflectionVerdict,
    Result,
};

use crate::codec::{Invocation, decode_invocation};
use crate::oracle::{DecisionOracle, OraclePrompt};
use crate::prompts;
use crate::schema::{
    ArgumentSet, SchemaError, arguments_from_invocation, evaluation_from_invocation,
    plan_from_invocation, reflection_from_invocation,
};

/// Oracle boundary with bounded local recovery.
#[derive(Clone)]
pub struct OracleSession {
    oracle: Arc<dyn DecisionOracle>,
    retry_limit: usize,
}

impl OracleSession {
    /// Creates a session allowing `retry_limit` corrective re-prompts per
    /// request.
    pub fn new(oracle: Arc<dyn DecisionOracle>, retry_limit: usize) -> Self {
        Self {
            oracle,
            retry_limit,
        }
    }

    /// Requests a plan for the objective.
    ///
    /// # Errors
    /// Returns an error if the transport fails or the re-prompt budget is
    /// exhausted.
    pub async fn request_plan(&self, objective: &str, catalog: &[String]) -> Result<Plan> {
        let prompt = prompts::plan_prompt(objective, catalog);
        self.request("plan", prompt, plan_from_invocation).await
    }

    /// Requests refined arguments for one step.
    ///
    /// # Errors
    /// Returns an error if the transport fails or the re-prompt budget is
    /// exhausted.
    pub async fn request_arguments(
        &self,
        step: &PlanStep,
        recent: &[ExecutionRecord],
    ) -> Result<ArgumentSet> {
        let prompt = prompts::arguments_prompt(step, recent);
        self.request("arguments", prompt, arguments_from_invocation)
            .await
    }

    /// Requests an evaluation verdict over a bounded log window.
    ///
    /// # Errors
    /// Returns an error if the transport fails or the re-prompt budget is
    /// exhausted.
    pub async fn request_evaluation(
        &self,
        objective: &str,
        plan: &Plan,
        stats: &ExecutionStats,
        window: &[ExecutionRecord],
        retry_occurred: bool,
    ) -> Result<EvaluationVerdict> {
        let prompt = prompts::evaluation_prompt(objective, plan, stats, window, retry_occurred);
        self.request("evaluation", prompt, evaluation_from_invocation)
            .await
    }

    /// Requests a reflection verdict.
    ///
    /// # Errors
    /// Returns an error if the transport fails or the re-prompt budget is
    /// exhausted.
    pub async fn request_reflection(
        &self,
        objective: &str,
        plan: &Plan,
        latest: &[ExecutionRecord],
        catalog: &[String],
        max_supplements: usize,
    ) -> Result<ReflectionVerdict> {
        let prompt = prompts::reflection_prompt(objective, plan, latest, catalog, max_supplements);
        self.request("reflection", prompt, |invocation| {
            reflection_from_invocation(invocation, max_supplements)
        })
        .await
    }

    /// Runs one request with bounded corrective recovery.
    async fn request<T>(
        &self,
        label: &str,
        prompt: OraclePrompt,
        parse: impl Fn(&Invocation) -> std::result::Result<T, SchemaError>,
    ) -> Result<T> {
        let mut prompt = prompt;
        let mut last_violation = String::new();

        for attempt in 0..=self.retry_limit {
            let text = self.oracle.complete(&prompt).await?;

            let violation = match decode_invocation(&text) {
                Ok(invocation) => match parse(&invocation) {
                    Ok(value) => {
                        debug!("Oracle {label} request accepted on attempt {}", attempt + 1);
                        return Ok(value);
                    }
                    Err(schema_error) => schema_error.to_string(),
                },
                Err(codec_error) => codec_error.to_string(),
            };

            warn!(
                "Oracle {label} response rejected (attempt {}/{}): {violation}",
                attempt + 1,
                self.retry_limit + 1
            );
            prompt = prompt.with_reminder(&violation);
            last_violation = violation;
        }

        Err(Error::OracleExhausted(format!(
            "{label} request: {last_violation}"
        )))
    }
}
