//! Scripted tools for testing scheduler and repair behavior.
//!
//! Allows defining per-call outcomes for a named tool, enabling end-to-end
//! testing of execution workflows without real side effects. The call
//! history doubles as proof of whether the invoker ever reached the tool.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use windlass_core::IgnoreLock as _;

use crate::schema::ToolSchema;
use crate::tool::{Tool, ToolError, ToolInput, ToolOutput, ToolResult};

/// One scripted call outcome.
#[derive(Debug, Clone)]
pub enum ScriptedOutcome {
    /// Return a successful output with this message.
    Succeed(String),
    /// Return an unsuccessful output with this message.
    Fail(String),
    /// Return `Err(ToolError::ExecutionFailed)` with this message.
    Throw(String),
    /// Panic with this message. Used to prove the invoker contains the
    /// unwind instead of losing the step.
    Panic(String),
    /// Sleep for this many milliseconds, then succeed. Used to trip the
    /// invoker's deadline.
    Stall(u64),
}

/// Script storage type.
type Script = Arc<Mutex<VecDeque<ScriptedOutcome>>>;

/// Tool that replays a scripted sequence of outcomes.
///
/// Once the script is exhausted every further call succeeds, so a test only
/// scripts the interesting prefix.
#[derive(Clone)]
pub struct MockTool {
    /// Name of this mock tool.
    name: &'static str,
    /// Declared parameter schema.
    schema: ToolSchema,
    /// Remaining scripted outcomes.
    script: Script,
    /// Arguments of every call made, in order.
    call_history: Arc<Mutex<Vec<Value>>>,
}

impl MockTool {
    /// Creates a mock tool that always succeeds.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            schema: ToolSchema::empty(),
            script: Arc::new(Mutex::new(VecDeque::new())),
            call_history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Sets the declared schema.
    #[must_use]
    pub fn with_schema(mut self, schema: ToolSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Appends one outcome to the script.
    #[must_use]
    pub fn with_outcome(self, outcome: ScriptedOutcome) -> Self {
        {
            let mut script = self.script.lock_ignore_poison();
            script.push_back(outcome);
        }
        self
    }

    /// Scripts `count` failures before the default success takes over.
    #[must_use]
    pub fn failing_times(self, count: usize) -> Self {
        let mut tool = self;
        for _ in 0..count {
            tool = tool.with_outcome(ScriptedOutcome::Fail("scripted failure".to_owned()));
        }
        tool
    }

    /// Number of calls made so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        let history = self.call_history.lock_ignore_poison();
        history.len()
    }

    /// Arguments of every call made, in order.
    #[must_use]
    pub fn call_history(&self) -> Vec<Value> {
        let history = self.call_history.lock_ignore_poison();
        history.clone()
    }
}

#[async_trait]
impl Tool for MockTool {
    fn name(&self) -> &'static str {
        self.name
    }

    fn description(&self) -> &'static str {
        "scripted tool for tests"
    }

    fn schema(&self) -> ToolSchema {
        self.schema.clone()
    }

    async fn execute(&self, input: ToolInput) -> ToolResult<ToolOutput> {
        {
            let mut history = self.call_history.lock_ignore_poison();
            history.push(input.params.clone());
        }

        let outcome = {
            let mut script = self.script.lock_ignore_poison();
            script.pop_front()
        };

        match outcome {
            None => Ok(ToolOutput::success_with_data(
                format!("{} ok", self.name),
                json!({"echo": input.params}),
            )),
            Some(ScriptedOutcome::Succeed(message)) => Ok(ToolOutput::success(message)),
            Some(ScriptedOutcome::Fail(message)) => Ok(ToolOutput::error(message)),
            Some(ScriptedOutcome::Throw(message)) => Err(ToolError::ExecutionFailed(message)),
            Some(ScriptedOutcome::Panic(message)) => panic!("{message}"),
            Some(ScriptedOutcome::Stall(millis)) => {
                tokio::time::sleep(Duration::from_millis(millis)).await;
                Ok(ToolOutput::success("finally"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_replays_then_defaults() {
        let tool = MockTool::new("probe")
            .with_outcome(ScriptedOutcome::Fail("first call fails".to_owned()));

        let first = tool
            .execute(ToolInput {
                params: json!({"id": 1}),
            })
            .await
            .unwrap();
        assert!(!first.success);

        let second = tool
            .execute(ToolInput {
                params: json!({"id": 2}),
            })
            .await
            .unwrap();
        assert!(second.success);

        assert_eq!(tool.call_count(), 2);
        assert_eq!(tool.call_history()[1]["id"], 2);
    }

    #[tokio::test]
    async fn test_throw_outcome_errors() {
        let tool = MockTool::new("thrower")
            .with_outcome(ScriptedOutcome::Throw("boom".to_owned()));

        let error = tool
            .execute(ToolInput { params: Value::Null })
            .await
            .unwrap_err();
        assert!(error.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn test_failing_times() {
        let tool = MockTool::new("flaky").failing_times(2);
        for expected in [false, false, true] {
            let output = tool
                .execute(ToolInput { params: Value::Null })
                .await
                .unwrap();
            assert_eq!(output.success, expected);
        }
    }
}
