//! One handler per node kind, selected by an exhaustive match.

mod agent;
mod condition;
mod input;
mod iterate;
mod merge;
mod output;
mod parallel;
mod tool;

use crate::capability::{AgentCapability, ToolCapability};
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::graph::Node;
use crate::types::NodeKind;
use crate::workflow::record::RecordHandle;
use serde_json::Value;
use std::collections::BTreeMap;

/// Resolved prerequisite values keyed by destination input slot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlotInputs(BTreeMap<usize, Value>);

impl SlotInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, slot: usize, value: Value) {
        self.0.insert(slot, value);
    }

    pub fn with(mut self, slot: usize, value: Value) -> Self {
        self.insert(slot, value);
        self
    }

    /// The value wired into slot 0
    pub fn primary(&self) -> Option<&Value> {
        self.0.get(&0)
    }

    /// `(slot, value)` pairs in slot order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Value)> {
        self.0.iter().map(|(slot, value)| (*slot, value))
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.0.values()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Everything a handler may touch while running one node
pub(crate) struct NodeContext<'a> {
    pub node: &'a Node,
    pub inputs: &'a SlotInputs,
    pub record: &'a RecordHandle,
    pub agent: &'a dyn AgentCapability,
    pub tools: &'a dyn ToolCapability,
    pub config: &'a EngineConfig,
}

pub(crate) async fn dispatch(ctx: &NodeContext<'_>) -> EngineResult<Value> {
    match ctx.node.kind {
        NodeKind::Input => input::run(ctx).await,
        NodeKind::Agent => agent::run(ctx).await,
        NodeKind::Tool => tool::run(ctx).await,
        NodeKind::Condition => condition::run(ctx).await,
        NodeKind::Output => output::run(ctx).await,
        NodeKind::Loop => iterate::run(ctx).await,
        NodeKind::Parallel => parallel::run(ctx).await,
        NodeKind::Merge => merge::run(ctx).await,
    }
}

/// Text form of a value: strings verbatim, null empty, everything else as JSON
pub(crate) fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Instruction prefix and input text joined by a blank line
pub(crate) fn compose_prompt(instructions: &str, input: &str) -> String {
    format!("{}\n\n{}", instructions, input).trim().to_string()
}
