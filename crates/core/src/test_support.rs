// Scripted capabilities and a handler harness shared by unit tests

use crate::capability::{AgentCapability, Tool, ToolRegistry};
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::graph::Node;
use crate::workflow::handlers::{dispatch, NodeContext, SlotInputs};
use crate::workflow::record::{ExecutionRegistry, RecordHandle};
use anyhow::Result;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Agent that echoes its message, refusing any message containing "FAIL"
#[derive(Default)]
pub(crate) struct ScriptedAgent {
    calls: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl ScriptedAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            delay: Some(delay),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl AgentCapability for ScriptedAgent {
    async fn call(&self, message: &str) -> Result<String> {
        self.calls.lock().unwrap().push(message.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if message.contains("FAIL") {
            anyhow::bail!("agent refused: {}", message);
        }
        Ok(format!("agent: {}", message))
    }
}

/// Returns its arguments serialized as JSON
pub(crate) struct EchoTool;

#[async_trait::async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    async fn execute(&self, arguments: Map<String, Value>) -> Result<String> {
        Ok(Value::Object(arguments).to_string())
    }
}

/// Fails when its query is "bad"
pub(crate) struct FlakyTool;

#[async_trait::async_trait]
impl Tool for FlakyTool {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn execute(&self, arguments: Map<String, Value>) -> Result<String> {
        match arguments.get("query").and_then(Value::as_str) {
            Some("bad") => anyhow::bail!("flaky tool rejected 'bad'"),
            Some(query) => Ok(format!("ok: {}", query)),
            None => anyhow::bail!("flaky tool needs a query"),
        }
    }
}

pub(crate) fn tools() -> ToolRegistry {
    ToolRegistry::new()
        .with_tool(Arc::new(EchoTool))
        .with_tool(Arc::new(FlakyTool))
}

/// Runs single nodes against a fresh record
pub(crate) struct Harness {
    pub record: RecordHandle,
    pub agent: Arc<ScriptedAgent>,
    pub tools: ToolRegistry,
    pub config: EngineConfig,
}

impl Harness {
    pub async fn new(input: Option<Value>) -> Self {
        Self {
            record: ExecutionRegistry::new().open(input).await,
            agent: Arc::new(ScriptedAgent::new()),
            tools: tools(),
            config: EngineConfig::default(),
        }
    }

    pub async fn run(&self, node: &Node, inputs: SlotInputs) -> EngineResult<Value> {
        let ctx = NodeContext {
            node,
            inputs: &inputs,
            record: &self.record,
            agent: self.agent.as_ref(),
            tools: &self.tools,
            config: &self.config,
        };
        dispatch(&ctx).await
    }
}
