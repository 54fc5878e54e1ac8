// External capabilities the engine calls into: the reasoning agent and named tools

use anyhow::Result;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Call into the reasoning core with a text message
#[async_trait::async_trait]
pub trait AgentCapability: Send + Sync {
    async fn call(&self, message: &str) -> Result<String>;
}

/// Invoke a named tool with keyword arguments
#[async_trait::async_trait]
pub trait ToolCapability: Send + Sync {
    async fn call(&self, name: &str, arguments: Map<String, Value>) -> Result<String>;
}

/// A single tool that can be registered in a [`ToolRegistry`]
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Name the tool is looked up by
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Execute the tool and return its message
    async fn execute(&self, arguments: Map<String, Value>) -> Result<String>;
}

/// Tool registry for resolving tools by name
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool, replacing any tool with the same name
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Check if a tool exists
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Registered tool names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ToolCapability for ToolRegistry {
    async fn call(&self, name: &str, arguments: Map<String, Value>) -> Result<String> {
        let tool = self
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("Tool '{}' not found", name))?;

        tracing::debug!("Invoking tool {} with {} argument(s)", name, arguments.len());
        tool.execute(arguments).await
    }
}
