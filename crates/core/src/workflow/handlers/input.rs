use super::NodeContext;
use crate::error::EngineResult;
use serde_json::Value;

/// The run's initial input, or the node's default when none was supplied
pub(super) async fn run(ctx: &NodeContext<'_>) -> EngineResult<Value> {
    match ctx.record.variable("input").await {
        Some(value) if !value.is_null() => Ok(value),
        _ => Ok(ctx
            .node
            .data
            .get("default_value")
            .cloned()
            .unwrap_or_else(|| Value::String(String::new()))),
    }
}
