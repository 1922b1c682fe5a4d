//! Prompt builders for each oracle request kind.
//!
//! Every prompt restates the wire contract so the oracle answers with one
//! typed `<invoke>` payload; the builders only assemble context, they never
//! decide anything.

use std::fmt::Write as _;

use windlass_core::{ExecutionRecord, ExecutionStats, Plan, PlanStep};

use crate::oracle::OraclePrompt;
use crate::schema::{TOOL_ARGUMENTS, TOOL_EVALUATION, TOOL_PLAN, TOOL_REFLECTION};

/// Wire contract shared by every request.
const WIRE_CONTRACT: &str = "Respond with exactly one <invoke tool=\"...\"> element. \
Every <param> and <item> must carry an explicit type attribute \
(string, number, boolean, null, array, object); arrays contain <item> children \
and objects contain nested <param name=\"...\"> children. \
Content outside the <invoke> element is ignored.";

/// Builds the planning request.
pub fn plan_prompt(objective: &str, catalog: &[String]) -> OraclePrompt {
    let mut user = String::new();
    let _ = writeln!(user, "Objective:\n{objective}\n");
    let _ = writeln!(user, "Available tools: {}", catalog.join(", "));
    let _ = writeln!(
        user,
        "\nProduce a plan as <invoke tool=\"{TOOL_PLAN}\"> with params: \
         overview (string) and steps (array of object). Each step object has \
         index (number, 0-based position), tool_name (string), reason_lines \
         (array of string — rationale, not outcome predictions), \
         draft_arguments (object), and depends_on (array of number, earlier \
         indices only)."
    );
    OraclePrompt::new(
        format!("You are a planning system for a tool-running agent. {WIRE_CONTRACT}"),
        user,
    )
}

/// Builds the per-step argument refinement request.
pub fn arguments_prompt(step: &PlanStep, recent: &[ExecutionRecord]) -> OraclePrompt {
    let mut user = String::new();
    let _ = writeln!(
        user,
        "Step {} invokes tool '{}'.",
        step.index, step.tool_name
    );
    if !step.reason_lines.is_empty() {
        let _ = writeln!(user, "Rationale: {}", step.reason_lines.join(" "));
    }
    let _ = writeln!(user, "Draft arguments: {}", step.draft_arguments);
    if !recent.is_empty() {
        let _ = writeln!(user, "\nMost recent results:");
        for record in recent {
            let _ = writeln!(
                user,
                "- step {} ({}): {} — {}",
                record.step_index, record.tool_name, record.result.code, record.result.message
            );
        }
    }
    let _ = writeln!(
        user,
        "\nAnswer as <invoke tool=\"{TOOL_ARGUMENTS}\"> with params: \
         step_index (number) and arguments (object): the final arguments for \
         this call."
    );
    OraclePrompt::new(
        format!("You finalize tool arguments for one plan step. {WIRE_CONTRACT}"),
        user,
    )
}

/// Builds the evaluation request over a bounded log window.
pub fn evaluation_prompt(
    objective: &str,
    plan: &Plan,
    stats: &ExecutionStats,
    window: &[ExecutionRecord],
    retry_occurred: bool,
) -> OraclePrompt {
    let mut user = String::new();
    let _ = writeln!(user, "Objective:\n{objective}\n");
    let _ = writeln!(user, "Plan overview: {}", plan.overview);
    let _ = writeln!(
        user,
        "Stats: attempted {}, succeeded {} ({:.0}% success).",
        stats.attempted,
        stats.succeeded,
        stats.success_rate() * 100.0
    );
    if retry_occurred {
        let _ = writeln!(
            user,
            "At least one repair pass has run; the records below are the most \
             recent per step and supersede anything earlier."
        );
    }
    let _ = writeln!(user, "\nMost recent records (newest last):");
    for record in window {
        let _ = writeln!(
            user,
            "- step {} ({}): success={} code={} — {}",
            record.step_index,
            record.tool_name,
            record.result.success,
            record.result.code,
            record.result.message
        );
    }
    let _ = writeln!(
        user,
        "\nJudge two independent axes: success (did every attempted invocation \
         complete without error and with a plausible result?) and incomplete \
         (does the objective still have unmet sub-goals?). Answer as \
         <invoke tool=\"{TOOL_EVALUATION}\"> with params: success (boolean), \
         incomplete (boolean), failed_steps (array of object with index \
         (number), tool_name (string), reason (string)), summary (string). \
         failed_steps must be non-empty whenever success is false and \
         empty whenever success is true."
    );
    OraclePrompt::new(
        format!("You judge whether an executed plan met its objective. {WIRE_CONTRACT}"),
        user,
    )
}

/// Builds the reflection request comparing the objective against executed
/// steps.
pub fn reflection_prompt(
    objective: &str,
    plan: &Plan,
    latest: &[ExecutionRecord],
    catalog: &[String],
    max_supplements: usize,
) -> OraclePrompt {
    let mut user = String::new();
    let _ = writeln!(user, "Objective:\n{objective}\n");
    let _ = writeln!(user, "Plan overview: {}", plan.overview);
    let _ = writeln!(user, "Executed steps (current truth per index):");
    for record in latest {
        let _ = writeln!(
            user,
            "- step {} ({}): success={} — {}",
            record.step_index, record.tool_name, record.result.success, record.result.message
        );
    }
    let _ = writeln!(user, "\nAvailable tools: {}", catalog.join(", "));
    let _ = writeln!(
        user,
        "\nDoes the executed work cover the objective? Answer as \
         <invoke tool=\"{TOOL_REFLECTION}\"> with params: is_complete \
         (boolean), missing_aspects (array of string), supplements (array of \
         object with action (string), rationale (string), and optionally \
         suggested_tool (string, one of the available tools)). Propose at \
         most {max_supplements} supplements, and none when is_complete is \
         true."
    );
    OraclePrompt::new(
        format!("You check a finished run for completeness. {WIRE_CONTRACT}"),
        user,
    )
}
