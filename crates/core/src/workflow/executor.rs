use super::dag::WorkflowDag;
use super::handlers::{self, NodeContext, SlotInputs};
use super::record::{ExecutionRecord, ExecutionRegistry, RecordHandle, StatusSnapshot};
use super::template;
use crate::capability::{AgentCapability, ToolCapability};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::events::{preview, LogEntry};
use crate::graph::{self, Graph, Node, ValidationReport};
use crate::types::{ExecutionId, ExecutionStatus, NodeId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// What `execute` hands back to its caller; never an `Err`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub execution_id: ExecutionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub log: Vec<crate::events::LogEntry>,
    /// Seconds
    pub duration: f64,
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Workflow executor that resolves and runs graphs.
///
/// Cloning is cheap; clones share the execution registry.
#[derive(Clone)]
pub struct WorkflowExecutor {
    agent: Arc<dyn AgentCapability>,
    tools: Arc<dyn ToolCapability>,
    config: Arc<EngineConfig>,
    registry: ExecutionRegistry,
}

/// Per-run memo and recursion guard
struct RunState {
    dag: Arc<WorkflowDag>,
    record: RecordHandle,
    results: HashMap<NodeId, Value>,
    active: HashSet<NodeId>,
}

impl WorkflowExecutor {
    pub fn new(agent: Arc<dyn AgentCapability>, tools: Arc<dyn ToolCapability>) -> Self {
        Self {
            agent,
            tools,
            config: Arc::new(EngineConfig::default()),
            registry: ExecutionRegistry::new(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Execute a wire definition and return the outcome
    pub async fn execute(&self, definition: &Value, input: Option<Value>) -> ExecutionOutcome {
        let record = self.registry.open(input).await;
        self.drive(record, || Graph::parse(definition)).await
    }

    /// Execute an already parsed graph
    pub async fn execute_graph(&self, graph: Graph, input: Option<Value>) -> ExecutionOutcome {
        let record = self.registry.open(input).await;
        self.drive(record, move || Ok(graph)).await
    }

    /// Start an execution in the background and return its id immediately
    pub async fn spawn(
        &self,
        definition: Value,
        input: Option<Value>,
    ) -> (ExecutionId, tokio::task::JoinHandle<ExecutionOutcome>) {
        let record = self.registry.open(input).await;
        let id = record.id();
        let executor = self.clone();
        let handle = tokio::spawn(async move {
            executor
                .drive(record, move || Graph::parse(&definition))
                .await
        });
        (id, handle)
    }

    /// Check a wire definition for structural defects without running it
    pub fn validate(&self, definition: &Value) -> ValidationReport {
        graph::validate(definition)
    }

    /// Render a definition as a reusable template document
    pub fn export_template(&self, definition: &Value) -> EngineResult<String> {
        template::export_template(definition)
    }

    pub async fn get_status(&self, id: ExecutionId) -> Option<StatusSnapshot> {
        let record = self.registry.get(id).await?;
        Some(record.snapshot().await)
    }

    /// Full record of an execution, including its log and variables
    pub async fn get_record(&self, id: ExecutionId) -> Option<ExecutionRecord> {
        let record = self.registry.get(id).await?;
        Some(record.record().await)
    }

    pub async fn list_executions(&self) -> Vec<StatusSnapshot> {
        self.registry.snapshots().await
    }

    /// Mark a running execution as stopped.
    ///
    /// A handler already in flight is not interrupted; the run halts before
    /// dispatching its next node.
    pub async fn stop(&self, id: ExecutionId) -> bool {
        let Some(record) = self.registry.get(id).await else {
            return false;
        };

        let stopped = record.stop().await;
        if stopped {
            tracing::warn!("Execution {} stopped by request", id);
        }
        stopped
    }

    async fn drive<F>(&self, record: RecordHandle, load: F) -> ExecutionOutcome
    where
        F: FnOnce() -> EngineResult<Graph>,
    {
        let id = record.id();
        tracing::info!("Starting workflow execution: execution_id={}", id);

        let result = match load() {
            Ok(graph) => self.run_graph(&record, graph).await,
            Err(e) => Err(e),
        };

        let (result, error) = match result {
            Ok(value) => {
                if record.finish(ExecutionStatus::Completed).await {
                    tracing::info!("Workflow execution completed: execution_id={}", id);
                }
                (Some(value), None)
            }
            Err(e) => {
                record.append(LogEntry::error(e.to_string())).await;
                if record.finish(ExecutionStatus::Failed).await {
                    let stage = if e.is_structural() { "rejected" } else { "failed" };
                    tracing::error!("Workflow execution {}: execution_id={}, error={}", stage, id, e);
                }
                (None, Some(e.to_string()))
            }
        };

        let snapshot = record.record().await;
        ExecutionOutcome {
            execution_id: id,
            result,
            error,
            duration: snapshot.duration_secs(),
            log: snapshot.log,
        }
    }

    async fn run_graph(&self, record: &RecordHandle, graph: Graph) -> EngineResult<Value> {
        let dag = Arc::new(WorkflowDag::from_graph(graph)?);

        let start_nodes = dag.start_nodes();
        if start_nodes.is_empty() {
            return Err(EngineError::NoStartNode);
        }
        dag.check_acyclic()?;

        let mut run = RunState {
            dag: dag.clone(),
            record: record.clone(),
            results: HashMap::new(),
            active: HashSet::new(),
        };

        // Drive every start chain down to its sinks
        let mut chains = Vec::with_capacity(start_nodes.len());
        for start in &start_nodes {
            let targets = dag.reachable_sinks(start);
            let mut values = Vec::with_capacity(targets.len());
            for target in targets {
                values.push(self.resolve(&mut run, target).await?);
            }
            chains.push(if values.len() == 1 {
                values.remove(0)
            } else {
                Value::Array(values)
            });
        }

        let outputs = dag.output_nodes();
        if !outputs.is_empty() {
            let mut values = Vec::with_capacity(outputs.len());
            for output in outputs {
                values.push(self.resolve(&mut run, output).await?);
            }
            return Ok(Value::Array(values));
        }

        Ok(if chains.len() == 1 {
            chains.remove(0)
        } else {
            Value::Array(chains)
        })
    }

    /// Resolve a node's value, resolving everything that feeds it first.
    ///
    /// Walks an explicit stack so chain depth is bounded by the heap, not the
    /// call stack. Each node is dispatched at most once per run.
    async fn resolve(&self, run: &mut RunState, target: NodeId) -> EngineResult<Value> {
        let dag = run.dag.clone();
        // (node, prerequisites already scheduled)
        let mut stack = vec![(target.clone(), false)];

        while let Some((node_id, expanded)) = stack.pop() {
            if run.results.contains_key(&node_id) {
                continue;
            }

            if !expanded {
                if !run.active.insert(node_id.clone()) {
                    return Err(EngineError::CircularDependency { node_id });
                }
                stack.push((node_id.clone(), true));

                // Reversed so the first declared prerequisite runs first
                for connection in dag.incoming(&node_id).iter().rev() {
                    if !run.results.contains_key(&connection.from_node) {
                        stack.push((connection.from_node.clone(), false));
                    }
                }
                continue;
            }

            let node = dag.node(&node_id).ok_or_else(|| {
                EngineError::MalformedGraph(format!("node {} is not part of the graph", node_id))
            })?;

            let mut inputs = SlotInputs::new();
            for connection in dag.incoming(&node_id) {
                let value = run.results.get(&connection.from_node).cloned().ok_or_else(|| {
                    EngineError::CircularDependency {
                        node_id: connection.from_node.clone(),
                    }
                })?;
                inputs.insert(connection.to_input, value);
            }

            let value = self.dispatch(&run.record, node, &inputs).await?;

            run.active.remove(&node_id);
            run.results.insert(node_id, value);
        }

        run.results
            .get(&target)
            .cloned()
            .ok_or(EngineError::CircularDependency { node_id: target })
    }

    async fn dispatch(
        &self,
        record: &RecordHandle,
        node: &Node,
        inputs: &SlotInputs,
    ) -> EngineResult<Value> {
        if record.status().await == ExecutionStatus::Stopped {
            return Err(EngineError::Stopped(record.id()));
        }

        record.set_current_node(&node.id).await;
        record
            .append(
                LogEntry::info(format!("Executing node {} ({})", node.id, node.kind))
                    .with_node(&node.id),
            )
            .await;
        tracing::info!("Executing node: {} ({})", node.id, node.kind);

        let ctx = NodeContext {
            node,
            inputs,
            record,
            agent: self.agent.as_ref(),
            tools: self.tools.as_ref(),
            config: &self.config,
        };

        match handlers::dispatch(&ctx).await {
            Ok(value) => {
                record
                    .append(
                        LogEntry::success(format!("Node {} completed successfully", node.id))
                            .with_node(&node.id)
                            .with_result(preview(&value, self.config.result_preview_chars)),
                    )
                    .await;
                Ok(value)
            }
            Err(e) => {
                let fault = e.into_node_fault(&node.id);
                let message = match &fault {
                    EngineError::NodeExecution { message, .. } => message.clone(),
                    other => other.to_string(),
                };
                record
                    .append(
                        LogEntry::error(format!("Node {} failed: {}", node.id, message))
                            .with_node(&node.id),
                    )
                    .await;
                tracing::warn!("Node {} failed: {}", node.id, message);
                Err(fault)
            }
        }
    }
}
