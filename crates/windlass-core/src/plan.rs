//! Plan data model for multi-step tool workflows.
//!
//! A plan is produced once per run by the decision oracle and is read-only
//! afterward; reflection may append a separate supplemental plan but never
//! mutates the original.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An ordered set of tool-invocation steps forming a DAG over indices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// One-paragraph description of what the plan intends to accomplish.
    pub overview: String,
    /// Ordered steps; `steps[i].index == i` for every well-formed plan.
    pub steps: Vec<PlanStep>,
}

impl Plan {
    /// Creates a plan from an overview and a list of steps.
    pub fn new(overview: impl Into<String>, steps: Vec<PlanStep>) -> Self {
        Self {
            overview: overview.into(),
            steps,
        }
    }

    /// Number of steps in the plan.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the plan has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// A single tool-invocation step in a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    /// Position of this step in the plan; also its identity in the log.
    pub index: usize,
    /// Name of the tool this step invokes.
    pub tool_name: String,
    /// Rationale for the step (why it exists, not what it will produce).
    #[serde(default)]
    pub reason_lines: Vec<String>,
    /// Optional hint for whatever step consumes this one's output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up_hint: Option<String>,
    /// Draft arguments proposed at planning time; may be refined per-step
    /// by the oracle just before invocation.
    #[serde(default)]
    pub draft_arguments: Value,
    /// Indices of steps that must reach a terminal status before this one
    /// is dispatched.
    #[serde(default)]
    pub depends_on: BTreeSet<usize>,
}

impl PlanStep {
    /// Creates a step with no dependencies and empty draft arguments.
    pub fn new(index: usize, tool_name: impl Into<String>) -> Self {
        Self {
            index,
            tool_name: tool_name.into(),
            reason_lines: Vec::new(),
            follow_up_hint: None,
            draft_arguments: Value::Null,
            depends_on: BTreeSet::new(),
        }
    }

    /// Sets the draft arguments.
    #[must_use]
    pub fn with_arguments(mut self, arguments: Value) -> Self {
        self.draft_arguments = arguments;
        self
    }

    /// Adds a dependency on an earlier step index.
    #[must_use]
    pub fn with_dependency(mut self, index: usize) -> Self {
        self.depends_on.insert(index);
        self
    }

    /// Sets the rationale lines.
    #[must_use]
    pub fn with_reasons(mut self, reasons: Vec<String>) -> Self {
        self.reason_lines = reasons;
        self
    }
}
