//! Outcome judgments: run evaluation, retry progress, and reflection.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Judgment of a run along two independent axes.
///
/// `success` asks whether every attempted invocation completed without
/// error; `incomplete` asks whether the objective still has unmet
/// sub-goals. A run can be fully successful yet incomplete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationVerdict {
    /// Every attempted invocation completed without error and with a
    /// plausible result.
    pub success: bool,
    /// The objective still has unmet sub-goals.
    pub incomplete: bool,
    /// Steps judged to have failed. Non-empty exactly when `success` is
    /// false; a verdict violating that is rejected at the oracle boundary.
    #[serde(default)]
    pub failed_steps: Vec<FailedStep>,
    /// One-paragraph summary of the judgment.
    pub summary: String,
}

impl EvaluationVerdict {
    /// Creates the shortcut verdict used when every attempted step
    /// succeeded and no retry pass has occurred.
    pub fn clean_success(summary: impl Into<String>) -> Self {
        Self {
            success: true,
            incomplete: false,
            failed_steps: Vec::new(),
            summary: summary.into(),
        }
    }

    /// Whether `success` and `failed_steps` agree: a failure must name at
    /// least one step, and a success must name none.
    pub fn is_well_formed(&self) -> bool {
        self.success == self.failed_steps.is_empty()
    }

    /// Indices of the failed steps.
    pub fn failed_indices(&self) -> BTreeSet<usize> {
        self.failed_steps.iter().map(|step| step.index).collect()
    }
}

/// One failed step inside an [`EvaluationVerdict`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedStep {
    /// Index of the failed step.
    pub index: usize,
    /// Tool the step invoked.
    pub tool_name: String,
    /// Why the step is considered failed.
    pub reason: String,
}

/// Progress of the bounded repair loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryState {
    /// Repair attempt number (1-based for the first retry pass).
    pub attempt: usize,
    /// Maximum number of repair attempts.
    pub max_attempts: usize,
    /// Indices the evaluator flagged as failed.
    pub failed_indices: BTreeSet<usize>,
    /// Failed indices plus everything transitively depending on them.
    pub retry_chain: BTreeSet<usize>,
}

/// Outcome of the single post-hoc completeness pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectionVerdict {
    /// Whether the executed steps cover the objective.
    pub is_complete: bool,
    /// Sub-goals the plan never addressed.
    #[serde(default)]
    pub missing_aspects: Vec<String>,
    /// Bounded list of proposed supplemental actions.
    #[serde(default)]
    pub supplements: Vec<Supplement>,
}

impl ReflectionVerdict {
    /// A verdict declaring the run complete with nothing to add.
    pub fn complete() -> Self {
        Self {
            is_complete: true,
            missing_aspects: Vec::new(),
            supplements: Vec::new(),
        }
    }
}

/// One supplemental action proposed by the reflection pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Supplement {
    /// What should be done.
    pub action: String,
    /// Why it is needed.
    pub rationale: String,
    /// Optional tool to run; must exist in the catalog or the binding is
    /// dropped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_tool: Option<String>,
}
