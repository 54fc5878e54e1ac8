// Core engine for graph-based agent workflows

pub mod capability;
pub mod config;
pub mod error;
pub mod events;
pub mod graph;
pub mod types;
pub mod workflow;

#[cfg(test)]
mod test_support;

pub use capability::{AgentCapability, Tool, ToolCapability, ToolRegistry};
pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use events::{LogEntry, LogLevel};
pub use graph::{validate, Connection, Graph, Node, ValidationReport};
pub use types::*;
pub use workflow::{ExecutionOutcome, StatusSnapshot, WorkflowExecutor};
