use super::{stringify, NodeContext};
use crate::error::EngineResult;
use serde_json::{Map, Value};

/// Combine every input into one value according to `strategy`
pub(super) async fn run(ctx: &NodeContext<'_>) -> EngineResult<Value> {
    let values: Vec<&Value> = ctx.inputs.values().collect();

    let merged = match ctx.node.data_str("strategy").unwrap_or("concatenate") {
        "concatenate" => Value::String(
            values
                .iter()
                .map(|v| stringify(v))
                .collect::<Vec<_>>()
                .join(" "),
        ),
        "array" => Value::Array(values.into_iter().cloned().collect()),
        "json" => Value::Object(
            values
                .into_iter()
                .enumerate()
                .map(|(i, v)| (format!("input_{}", i), v.clone()))
                .collect::<Map<String, Value>>(),
        ),
        _ => values.first().map(|v| (*v).clone()).unwrap_or(Value::Null),
    };

    Ok(merged)
}
