//! Error types for the workflow engine.

use crate::types::{ExecutionId, NodeId};

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Faults raised while parsing, validating or executing a workflow graph.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// The wire payload is structurally defective.
    #[error("Malformed graph: {0}")]
    MalformedGraph(String),

    /// A connection path leads back into a node that is still being resolved.
    #[error("Circular dependency detected in workflow at node {node_id}")]
    CircularDependency { node_id: NodeId },

    /// Every node has at least one incoming connection.
    #[error("No starting nodes found in workflow")]
    NoStartNode,

    /// A node names a type the engine has no handler for.
    #[error("No handler for node type: {0}")]
    UnknownNodeType(String),

    /// A node handler failed.
    #[error("Node {node_id} failed: {message}")]
    NodeExecution { node_id: NodeId, message: String },

    /// The agent or tool capability returned an error.
    #[error("External capability failed: {0}")]
    ExternalCapability(String),

    /// The execution was stopped before the next node could run.
    #[error("Execution {0} was stopped")]
    Stopped(ExecutionId),
}

impl EngineError {
    pub fn node(node_id: &NodeId, message: impl Into<String>) -> Self {
        Self::NodeExecution {
            node_id: node_id.clone(),
            message: message.into(),
        }
    }

    /// Attribute a handler fault to the node that raised it.
    pub fn into_node_fault(self, node_id: &NodeId) -> Self {
        match self {
            fault @ EngineError::NodeExecution { .. } => fault,
            fault @ EngineError::Stopped(_) => fault,
            other => EngineError::node(node_id, other.to_string()),
        }
    }

    /// Structural faults are detected before any node runs.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            EngineError::MalformedGraph(_)
                | EngineError::CircularDependency { .. }
                | EngineError::NoStartNode
                | EngineError::UnknownNodeType(_)
        )
    }
}

impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        EngineError::ExternalCapability(format!("{:#}", err))
    }
}
