// Offline capabilities so graphs can be exercised without external services

use anyhow::Result;
use nodeflow_core::{AgentCapability, Tool, ToolRegistry};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Agent that answers with the prompt it was given
pub struct DryRunAgent;

#[async_trait::async_trait]
impl AgentCapability for DryRunAgent {
    async fn call(&self, message: &str) -> Result<String> {
        tracing::debug!("Dry-run agent received {} chars", message.len());
        Ok(format!("[dry-run] {}", message))
    }
}

/// Returns its arguments as a JSON object
pub struct EchoTool;

#[async_trait::async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo the call arguments back as JSON"
    }

    async fn execute(&self, arguments: Map<String, Value>) -> Result<String> {
        Ok(serde_json::to_string(&arguments)?)
    }
}

pub fn dry_run_tools() -> ToolRegistry {
    ToolRegistry::new().with_tool(Arc::new(EchoTool))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodeflow_core::ToolCapability;
    use serde_json::json;

    #[tokio::test]
    async fn test_dry_run_agent_echoes_prompt() {
        let reply = DryRunAgent.call("hello").await.unwrap();
        assert_eq!(reply, "[dry-run] hello");
    }

    #[tokio::test]
    async fn test_echo_tool_registered() {
        let tools = dry_run_tools();
        let mut args = Map::new();
        args.insert("query".to_string(), json!("ping"));

        let reply = tools.call("echo", args).await.unwrap();
        assert_eq!(reply, r#"{"query":"ping"}"#);
        assert!(tools.call("knowledge_tool", Map::new()).await.is_err());
    }
}
