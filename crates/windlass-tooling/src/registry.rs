//! Tool registry for managing available tools.

use std::convert::AsRef;
use std::sync::Arc;

use super::Tool;

type ToolList = Arc<Vec<Arc<dyn Tool>>>;

/// Registry of the tools a plan may invoke; doubles as the catalog the
/// reflection pass checks suggested tools against.
#[derive(Clone)]
pub struct ToolRegistry {
    tools: ToolList,
}

impl ToolRegistry {
    /// Create a new empty tool registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tools: Arc::new(Vec::new()),
        }
    }

    /// Add a tool to the registry.
    #[must_use]
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        Arc::make_mut(&mut self.tools).push(tool);
        self
    }

    /// Get a tool by name, if it exists.
    #[must_use]
    pub fn get_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools
            .iter()
            .find(|tool_ref| tool_ref.name() == name)
            .cloned()
    }

    /// Whether a tool with this name is registered.
    #[must_use]
    pub fn has_tool(&self, name: &str) -> bool {
        self.get_tool(name).is_some()
    }

    /// List all available tools.
    #[must_use]
    pub fn list_tools(&self) -> Vec<&dyn Tool> {
        self.tools.iter().map(AsRef::as_ref).collect()
    }

    /// Names of every registered tool, in registration order.
    #[must_use]
    pub fn catalog(&self) -> Vec<String> {
        self.tools.iter().map(|tool| tool.name().to_owned()).collect()
    }

    /// Get number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ToolSchema;
    use crate::{ToolInput, ToolOutput, ToolResult};
    use async_trait::async_trait;

    struct NamedTool {
        name: &'static str,
    }

    #[async_trait]
    impl Tool for NamedTool {
        fn name(&self) -> &'static str {
            self.name
        }

        fn description(&self) -> &'static str {
            "a named test tool"
        }

        fn schema(&self) -> ToolSchema {
            ToolSchema::empty()
        }

        async fn execute(&self, _input: ToolInput) -> ToolResult<ToolOutput> {
            Ok(ToolOutput::success("ok"))
        }
    }

    #[test]
    fn test_empty_registry() {
        let registry = ToolRegistry::default();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(registry.catalog().is_empty());
    }

    #[test]
    fn test_lookup_and_catalog() {
        let registry = ToolRegistry::new()
            .with_tool(Arc::new(NamedTool { name: "alpha" }))
            .with_tool(Arc::new(NamedTool { name: "beta" }));

        assert_eq!(registry.len(), 2);
        assert!(registry.has_tool("alpha"));
        assert!(!registry.has_tool("gamma"));
        assert_eq!(registry.catalog(), vec!["alpha", "beta"]);
        assert_eq!(registry.get_tool("beta").unwrap().name(), "beta");
        assert_eq!(registry.list_tools().len(), 2);
    }
}
