use super::NodeContext;
use crate::error::{EngineError, EngineResult};
use serde_json::{json, Value};

/// Produce one record per configured iteration, each replaying the same input.
///
/// Downstream nodes are not re-executed per iteration.
pub(super) async fn run(ctx: &NodeContext<'_>) -> EngineResult<Value> {
    let node = ctx.node;
    let iterations = match node.data.get("iterations") {
        None | Some(Value::Null) => 1,
        Some(value) => value.as_u64().ok_or_else(|| {
            EngineError::node(&node.id, "'iterations' must be a non-negative integer")
        })?,
    };
    let input = ctx
        .inputs
        .primary()
        .cloned()
        .unwrap_or_else(|| Value::String(String::new()));

    let results: Vec<Value> = (0..iterations)
        .map(|i| json!({"iteration": i, "input": input, "result": input}))
        .collect();

    if let Some(last) = iterations.checked_sub(1) {
        ctx.record
            .set_variable(format!("loop_{}_iteration", node.id), json!(last))
            .await;
        ctx.record
            .set_variable(format!("loop_{}_input", node.id), input)
            .await;
    }

    Ok(Value::Array(results))
}

#[cfg(test)]
mod tests {
    use crate::error::EngineError;
    use crate::graph::Node;
    use crate::test_support::Harness;
    use crate::types::NodeKind;
    use crate::workflow::handlers::SlotInputs;
    use serde_json::json;

    #[tokio::test]
    async fn test_replays_input_per_iteration() {
        let harness = Harness::new(None).await;
        let node = Node::new("l", NodeKind::Loop).with_data("iterations", json!(3));

        let value = harness
            .run(&node, SlotInputs::new().with(0, json!("x")))
            .await
            .unwrap();
        assert_eq!(
            value,
            json!([
                {"iteration": 0, "input": "x", "result": "x"},
                {"iteration": 1, "input": "x", "result": "x"},
                {"iteration": 2, "input": "x", "result": "x"}
            ])
        );

        assert_eq!(harness.record.variable("loop_l_iteration").await, Some(json!(2)));
        assert_eq!(harness.record.variable("loop_l_input").await, Some(json!("x")));
    }

    #[tokio::test]
    async fn test_zero_iterations() {
        let harness = Harness::new(None).await;
        let node = Node::new("l", NodeKind::Loop).with_data("iterations", json!(0));

        let value = harness.run(&node, SlotInputs::new()).await.unwrap();
        assert_eq!(value, json!([]));
        assert_eq!(harness.record.variable("loop_l_iteration").await, None);
    }

    #[tokio::test]
    async fn test_invalid_iteration_count() {
        let harness = Harness::new(None).await;
        let node = Node::new("l", NodeKind::Loop).with_data("iterations", json!("many"));

        let err = harness.run(&node, SlotInputs::new()).await.unwrap_err();
        assert!(matches!(err, EngineError::NodeExecution { .. }));
    }
}
