use super::NodeContext;
use crate::error::{EngineError, EngineResult};
use serde_json::{Map, Value};

/// Invoke the configured tool with static arguments plus one argument per input slot
pub(super) async fn run(ctx: &NodeContext<'_>) -> EngineResult<Value> {
    let node = ctx.node;
    let tool_name = node.data_str("tool_name").unwrap_or(ctx.config.default_tool.as_str());

    let mut arguments = match node.data.get("tool_args") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(args)) => args.clone(),
        Some(_) => return Err(EngineError::node(&node.id, "'tool_args' must be an object")),
    };

    for (slot, value) in ctx.inputs.iter() {
        let param = node
            .data_str(&format!("input_param_{}", slot))
            .unwrap_or(ctx.config.default_tool_param.as_str());
        arguments.insert(param.to_string(), value.clone());
    }

    tracing::debug!("Tool node {} invoking {}", node.id, tool_name);
    let message = ctx.tools.call(tool_name, arguments).await?;

    Ok(Value::String(message))
}

#[cfg(test)]
mod tests {
    use crate::error::EngineError;
    use crate::graph::Node;
    use crate::test_support::Harness;
    use crate::types::NodeKind;
    use crate::workflow::handlers::SlotInputs;
    use serde_json::{json, Value};

    #[tokio::test]
    async fn test_inputs_merge_over_static_args() {
        let harness = Harness::new(None).await;
        let node = Node::new("t", NodeKind::Tool)
            .with_data("tool_name", json!("echo"))
            .with_data("tool_args", json!({"limit": 3, "query": "static"}))
            .with_data("input_param_1", json!("filter"));
        let inputs = SlotInputs::new().with(0, json!("rust")).with(1, json!("recent"));

        let value = harness.run(&node, inputs).await.unwrap();
        let echoed: Value = serde_json::from_str(value.as_str().unwrap()).unwrap();
        assert_eq!(echoed, json!({"limit": 3, "query": "rust", "filter": "recent"}));
    }

    #[tokio::test]
    async fn test_default_tool_comes_from_config() {
        let mut harness = Harness::new(None).await;
        harness.config.default_tool = "echo".to_string();
        let node = Node::new("t", NodeKind::Tool);

        let value = harness.run(&node, SlotInputs::new()).await.unwrap();
        assert_eq!(value, json!("{}"));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_a_capability_fault() {
        let harness = Harness::new(None).await;
        let node = Node::new("t", NodeKind::Tool).with_data("tool_name", json!("nope"));

        let err = harness.run(&node, SlotInputs::new()).await.unwrap_err();
        assert!(matches!(err, EngineError::ExternalCapability(ref m) if m.contains("nope")));
    }

    #[tokio::test]
    async fn test_non_object_args_rejected() {
        let harness = Harness::new(None).await;
        let node = Node::new("t", NodeKind::Tool)
            .with_data("tool_name", json!("echo"))
            .with_data("tool_args", json!([1]));

        let err = harness.run(&node, SlotInputs::new()).await.unwrap_err();
        assert!(matches!(err, EngineError::NodeExecution { .. }));
    }
}
