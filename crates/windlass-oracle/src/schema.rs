//! Payload schemas for oracle responses.
//!
//! Each decoded [`Invocation`] is validated against a fixed schema before
//! acceptance; an invariant-violating payload (for example a failure
//! verdict with no failed steps) is a schema violation even when it decodes
//! cleanly.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use windlass_core::{EvaluationVerdict, Plan, ReflectionVerdict};

use crate::codec::Invocation;

/// Root tool name for a plan payload.
pub const TOOL_PLAN: &str = "submit_plan";
/// Root tool name for an argument-set payload.
pub const TOOL_ARGUMENTS: &str = "submit_arguments";
/// Root tool name for an evaluation payload.
pub const TOOL_EVALUATION: &str = "submit_evaluation";
/// Root tool name for a reflection payload.
pub const TOOL_REFLECTION: &str = "submit_reflection";

/// Errors produced while validating a decoded payload.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The invocation named the wrong root tool for this request.
    #[error("expected tool '{expected}', got '{got}'")]
    WrongTool {
        /// Tool the request demanded.
        expected: String,
        /// Tool the payload named.
        got: String,
    },

    /// A field was missing or carried the wrong shape.
    #[error("payload field error: {0}")]
    Field(String),

    /// The payload decoded but violated a semantic invariant.
    #[error("invariant violation: {0}")]
    Invariant(String),
}

/// Refined arguments for one step's tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgumentSet {
    /// Index of the step these arguments belong to.
    pub step_index: usize,
    /// The refined arguments.
    pub arguments: Value,
}

fn expect_tool(invocation: &Invocation, expected: &str) -> Result<(), SchemaError> {
    if invocation.tool == expected {
        Ok(())
    } else {
        Err(SchemaError::WrongTool {
            expected: expected.to_owned(),
            got: invocation.tool.clone(),
        })
    }
}

fn from_params<T: serde::de::DeserializeOwned>(invocation: &Invocation) -> Result<T, SchemaError> {
    serde_json::from_value(Value::Object(invocation.params.clone()))
        .map_err(|err| SchemaError::Field(err.to_string()))
}

/// Validates a plan payload.
///
/// # Errors
/// Returns an error on the wrong root tool, a shape mismatch, or an empty
/// step list; deeper dependency validation belongs to the engine.
pub fn plan_from_invocation(invocation: &Invocation) -> Result<Plan, SchemaError> {
    expect_tool(invocation, TOOL_PLAN)?;
    let plan: Plan = from_params(invocation)?;
    if plan.is_empty() {
        return Err(SchemaError::Invariant("plan has no steps".to_owned()));
    }
    Ok(plan)
}

/// Validates an argument-set payload.
///
/// # Errors
/// Returns an error on the wrong root tool or a shape mismatch.
pub fn arguments_from_invocation(invocation: &Invocation) -> Result<ArgumentSet, SchemaError> {
    expect_tool(invocation, TOOL_ARGUMENTS)?;
    from_params(invocation)
}

/// Validates an evaluation payload, requiring `success` and
/// `failed_steps` to agree: a failure names at least one step, a success
/// names none.
///
/// # Errors
/// Returns an error on the wrong root tool, a shape mismatch, or an
/// invariant violation.
pub fn evaluation_from_invocation(
    invocation: &Invocation,
) -> Result<EvaluationVerdict, SchemaError> {
    expect_tool(invocation, TOOL_EVALUATION)?;
    let verdict: EvaluationVerdict = from_params(invocation)?;
    if !verdict.is_well_formed() {
        let violation = if verdict.success {
            "verdict claims success but failed_steps is non-empty"
        } else {
            "verdict claims failure but failed_steps is empty"
        };
        return Err(SchemaError::Invariant(violation.to_owned()));
    }
    Ok(verdict)
}

/// Validates a reflection payload, truncating supplements to the given
/// bound.
///
/// # Errors
/// Returns an error on the wrong root tool or a shape mismatch.
pub fn reflection_from_invocation(
    invocation: &Invocation,
    max_supplements: usize,
) -> Result<ReflectionVerdict, SchemaError> {
    expect_tool(invocation, TOOL_REFLECTION)?;
    let mut verdict: ReflectionVerdict = from_params(invocation)?;
    if verdict.supplements.len() > max_supplements {
        verdict.supplements.truncate(max_supplements);
    }
    if verdict.is_complete && !verdict.supplements.is_empty() {
        return Err(SchemaError::Invariant(
            "complete verdict must not carry supplements".to_owned(),
        ));
    }
    Ok(verdict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, json};

    fn invocation(tool: &str, params: Value) -> Invocation {
        let Value::Object(map) = params else {
            panic!("params must be an object");
        };
        Invocation::new(tool, map)
    }

    #[test]
    fn test_plan_accepted() {
        let inv = invocation(
            TOOL_PLAN,
            json!({
                "overview": "two steps",
                "steps": [
                    {"index": 0, "tool_name": "search", "draft_arguments": {"q": "x"}},
                    {"index": 1, "tool_name": "fetch", "depends_on": [0]}
                ]
            }),
        );
        let plan = plan_from_invocation(&inv).unwrap();
        assert_eq!(plan.len(), 2);
        assert!(plan.steps[1].depends_on.contains(&0));
    }

    #[test]
    fn test_empty_plan_rejected() {
        let inv = invocation(TOOL_PLAN, json!({"overview": "nothing", "steps": []}));
        assert!(matches!(
            plan_from_invocation(&inv).unwrap_err(),
            SchemaError::Invariant(_)
        ));
    }

    #[test]
    fn test_wrong_tool_rejected() {
        let inv = invocation(TOOL_EVALUATION, json!({"overview": "x", "steps": []}));
        assert!(matches!(
            plan_from_invocation(&inv).unwrap_err(),
            SchemaError::WrongTool { .. }
        ));
    }

    #[test]
    fn test_evaluation_invariant_enforced() {
        let bad = invocation(
            TOOL_EVALUATION,
            json!({"success": false, "incomplete": false, "failed_steps": [], "summary": "hm"}),
        );
        assert!(matches!(
            evaluation_from_invocation(&bad).unwrap_err(),
            SchemaError::Invariant(_)
        ));

        let good = invocation(
            TOOL_EVALUATION,
            json!({
                "success": false,
                "incomplete": true,
                "failed_steps": [{"index": 1, "tool_name": "fetch", "reason": "timeout"}],
                "summary": "fetch timed out"
            }),
        );
        let verdict = evaluation_from_invocation(&good).unwrap();
        assert!(!verdict.success);
        assert_eq!(verdict.failed_steps.len(), 1);
    }

    #[test]
    fn test_success_with_failed_steps_rejected() {
        let contradictory = invocation(
            TOOL_EVALUATION,
            json!({
                "success": true,
                "incomplete": false,
                "failed_steps": [{"index": 0, "tool_name": "fetch", "reason": "timeout"}],
                "summary": "all good, apart from the failure"
            }),
        );
        assert!(matches!(
            evaluation_from_invocation(&contradictory).unwrap_err(),
            SchemaError::Invariant(_)
        ));
    }

    #[test]
    fn test_arguments_payload() {
        let inv = invocation(
            TOOL_ARGUMENTS,
            json!({"step_index": 3, "arguments": {"limit": 10}}),
        );
        let args = arguments_from_invocation(&inv).unwrap();
        assert_eq!(args.step_index, 3);
        assert_eq!(args.arguments["limit"], 10);
    }

    #[test]
    fn test_reflection_truncates_supplements() {
        let inv = invocation(
            TOOL_REFLECTION,
            json!({
                "is_complete": false,
                "missing_aspects": ["no summary produced"],
                "supplements": [
                    {"action": "a", "rationale": "r"},
                    {"action": "b", "rationale": "r"},
                    {"action": "c", "rationale": "r"}
                ]
            }),
        );
        let verdict = reflection_from_invocation(&inv, 2).unwrap();
        assert_eq!(verdict.supplements.len(), 2);
    }

    #[test]
    fn test_reflection_complete_with_supplements_rejected() {
        let inv = invocation(
            TOOL_REFLECTION,
            json!({
                "is_complete": true,
                "supplements": [{"action": "a", "rationale": "r"}]
            }),
        );
        assert!(matches!(
            reflection_from_invocation(&inv, 3).unwrap_err(),
            SchemaError::Invariant(_)
        ));
    }

    #[test]
    fn test_missing_field_reported() {
        let inv = Invocation::new(TOOL_EVALUATION, Map::new());
        assert!(matches!(
            evaluation_from_invocation(&inv).unwrap_err(),
            SchemaError::Field(_)
        ));
    }
}
