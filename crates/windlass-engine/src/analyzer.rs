//! Dependency analysis over plan steps.
//!
//! Plans are small, so closure computation is a simple fixed-point scan
//! rather than a graph library; correctness over cleverness.

use std::collections::BTreeSet;

use windlass_core::{Error, Plan, PlanStep, Result};

/// Computes the retry chain: the smallest superset of `sources` closed
/// under "is a direct or transitive dependent of".
///
/// Walks strictly downstream (toward dependents), never upstream: a step is
/// added when its `depends_on` intersects the current result, repeated to a
/// fixed point.
pub fn dependency_closure(steps: &[PlanStep], sources: &BTreeSet<usize>) -> BTreeSet<usize> {
    let mut closure: BTreeSet<usize> = sources.clone();

    loop {
        let mut grew = false;
        for step in steps {
            if closure.contains(&step.index) {
                continue;
            }
            if step.depends_on.iter().any(|dep| closure.contains(dep)) {
                closure.insert(step.index);
                grew = true;
            }
        }
        if !grew {
            return closure;
        }
    }
}

/// Validates a plan before any execution.
///
/// Step indices must equal their positions, and every dependency must point
/// at a strictly earlier index: one check that rules out unknown targets,
/// self-references, forward references, and therefore cycles. A cyclic or
/// forward-referencing graph is a planning-time error, never a runtime
/// guessing game.
///
/// # Errors
/// Returns [`Error::InvalidPlan`] describing the first violation found.
pub fn validate_plan(plan: &Plan) -> Result<()> {
    if plan.is_empty() {
        return Err(Error::InvalidPlan("plan has no steps".to_owned()));
    }

    for (position, step) in plan.steps.iter().enumerate() {
        if step.index != position {
            return Err(Error::InvalidPlan(format!(
                "step at position {position} declares index {}",
                step.index
            )));
        }
        if step.tool_name.is_empty() {
            return Err(Error::InvalidPlan(format!(
                "step {position} has an empty tool name"
            )));
        }
        for &dep in &step.depends_on {
            if dep >= step.index {
                return Err(Error::InvalidPlan(format!(
                    "step {} depends on {dep}, which is not an earlier step",
                    step.index
                )));
            }
        }
    }

    Ok(())
}
