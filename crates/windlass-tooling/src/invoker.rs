//! Tool invocation boundary.
//!
//! Every invocation is wrapped: schema violations surface as `INVALID`
//! without reaching the tool, a missed deadline becomes `TIMEOUT`, and a
//! thrown tool error or a panic becomes `ERROR`. A [`StepResult`] is
//! always produced,
//! so a scheduler wavefront never stalls on a fault.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use windlass_core::{ResultCode, StepResult};

use crate::registry::ToolRegistry;
use crate::tool::{ToolError, ToolInput};

/// Wraps the registry with validation, deadline, and fault capture.
#[derive(Clone)]
pub struct ToolInvoker {
    registry: ToolRegistry,
    timeout: Duration,
}

impl ToolInvoker {
    /// Creates an invoker over the given registry with a per-call deadline.
    #[must_use]
    pub fn new(registry: ToolRegistry, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    /// The registry this invoker dispatches into.
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Invokes a tool by name, always yielding a result.
    ///
    /// Unknown tools and schema violations are classified `INVALID` and the
    /// tool is never called; those are malformed requests, not transient
    /// failures, and the retry loop will not touch them on its own.
    pub async fn invoke(&self, tool_name: &str, arguments: &Value) -> StepResult {
        let Some(tool) = self.registry.get_tool(tool_name) else {
            warn!("Unknown tool requested: {tool_name}");
            return StepResult::failure(
                ResultCode::Invalid,
                format!("unknown tool '{tool_name}'"),
            );
        };

        if let Err(violation) = tool.schema().validate(arguments) {
            debug!("Rejecting invocation of '{tool_name}': {violation}");
            return StepResult::failure(ResultCode::Invalid, violation);
        }

        let input = ToolInput {
            params: arguments.clone(),
        };

        // Executing on a separate task contains a panicking tool: the
        // unwind surfaces here as a join error instead of taking the
        // caller down with it.
        let mut handle = tokio::spawn(async move { tool.execute(input).await });
        let outcome = tokio::time::timeout(self.timeout, &mut handle).await;

        match outcome {
            Err(_elapsed) => {
                handle.abort();
                StepResult::failure(
                    ResultCode::Timeout,
                    format!(
                        "tool '{tool_name}' missed its {}ms deadline",
                        self.timeout.as_millis()
                    ),
                )
            }
            Ok(Err(joined)) => {
                warn!("Tool '{tool_name}' panicked: {joined}");
                StepResult::failure(
                    ResultCode::Error,
                    format!("tool '{tool_name}' panicked: {joined}"),
                )
            }
            Ok(Ok(Err(error))) => {
                let code = match error {
                    ToolError::InvalidInput(_) => ResultCode::Invalid,
                    ToolError::Io(_) | ToolError::ExecutionFailed(_) | ToolError::Serialization(_) => {
                        ResultCode::Error
                    }
                };
                StepResult::failure(code, error.to_string())
            }
            Ok(Ok(Ok(output))) => {
                if output.success {
                    StepResult::ok(output.message, output.data)
                } else {
                    StepResult {
                        success: false,
                        code: ResultCode::Error,
                        message: output.message,
                        data: output.data,
                    }
                }
            }
        }
    }
}
