use super::NodeContext;
use crate::error::EngineResult;
use crate::events::LogEntry;
use crate::workflow::expression::evaluate_condition;
use serde_json::{json, Map, Value};

/// Evaluate the node's condition against its inputs and the run variables.
///
/// An expression that fails to parse or evaluate is logged as a warning and
/// treated as true.
pub(super) async fn run(ctx: &NodeContext<'_>) -> EngineResult<Value> {
    let condition = ctx.node.data_str("condition").unwrap_or("true");
    let input_value = ctx.inputs.primary().cloned().unwrap_or(Value::Bool(true));

    let mut scope = Map::new();
    scope.insert("input".to_string(), input_value.clone());
    scope.insert(
        "variables".to_string(),
        Value::Object(ctx.record.variables().await),
    );
    for (slot, value) in ctx.inputs.iter() {
        scope.insert(format!("input_{}", slot), value.clone());
    }

    let condition_result = match evaluate_condition(condition, &scope) {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(
                "Condition on node {} failed to evaluate: {}",
                ctx.node.id,
                e
            );
            ctx.record
                .append(
                    LogEntry::warning(format!(
                        "Condition evaluation failed: {}, defaulting to true",
                        e
                    ))
                    .with_node(&ctx.node.id),
                )
                .await;
            true
        }
    };

    Ok(json!({
        "condition_result": condition_result,
        "value": input_value,
    }))
}
