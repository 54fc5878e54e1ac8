use super::{stringify, NodeContext};
use crate::error::EngineResult;
use serde_json::{json, Value};

pub(super) async fn run(ctx: &NodeContext<'_>) -> EngineResult<Value> {
    let node = ctx.node;
    let input = match ctx.inputs.primary() {
        Some(value) => value.clone(),
        None => node
            .data
            .get("default_value")
            .cloned()
            .unwrap_or_else(|| Value::String(String::new())),
    };

    let output = match node.data_str("format").unwrap_or("raw") {
        "json" => match input {
            Value::String(text) => {
                serde_json::from_str(&text).unwrap_or_else(|_| json!({ "output": text }))
            }
            other => other,
        },
        "formatted" => {
            let template = node.data_str("template").unwrap_or("{value}");
            Value::String(template.replace("{value}", &stringify(&input)))
        }
        _ => input,
    };

    Ok(output)
}
