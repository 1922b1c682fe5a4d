//! Tool boundary for the Windlass plan-execution engine.
//!
//! Provides the [`Tool`] trait with declared parameter schemas, the
//! [`ToolRegistry`], scripted mock tools for tests, and the [`ToolInvoker`]
//! that wraps every invocation so a result is always produced.

/// Tool invocation wrapper producing step results.
pub mod invoker;
/// Scripted tools for tests.
pub mod mock;
/// Tool registry for managing available tools.
pub mod registry;
/// Parameter schema declaration and validation.
pub mod schema;
/// Tool trait and input/output types.
pub mod tool;

pub use invoker::ToolInvoker;
pub use mock::{MockTool, ScriptedOutcome};
pub use registry::ToolRegistry;
pub use schema::{ParamKind, ParamSpec, ToolSchema};
pub use tool::{Tool, ToolError, ToolInput, ToolOutput, ToolResult};
