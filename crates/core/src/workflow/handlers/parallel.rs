use super::{compose_prompt, stringify, NodeContext};
use crate::error::EngineResult;
use futures::future::join_all;
use serde_json::{json, Map, Value};
use std::time::Duration;

/// Fan out one concurrent unit per input and wait for all of them.
///
/// A failing unit yields an `{index, error}` marker in its position; it never
/// fails the node.
pub(super) async fn run(ctx: &NodeContext<'_>) -> EngineResult<Value> {
    if ctx.inputs.is_empty() {
        return Ok(Value::Array(Vec::new()));
    }

    tracing::debug!(
        "Parallel node {} fanning out {} unit(s)",
        ctx.node.id,
        ctx.inputs.len()
    );

    let units = ctx
        .inputs
        .values()
        .enumerate()
        .map(|(index, input)| run_unit(ctx, index, input));

    let entries = join_all(units)
        .await
        .into_iter()
        .enumerate()
        .map(|(index, outcome)| match outcome {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Parallel unit {} of node {} failed: {}", index, ctx.node.id, e);
                json!({"index": index, "error": e.to_string()})
            }
        })
        .collect();

    Ok(Value::Array(entries))
}

async fn run_unit(ctx: &NodeContext<'_>, index: usize, input: &Value) -> EngineResult<Value> {
    let node = ctx.node;

    if let Some(tool_name) = node.data_str("tool_name") {
        let param = node
            .data_str("input_param")
            .unwrap_or(ctx.config.default_tool_param.as_str());
        let mut arguments = Map::new();
        arguments.insert(param.to_string(), input.clone());

        let result = ctx.tools.call(tool_name, arguments).await?;
        return Ok(json!({"index": index, "input": input, "result": result}));
    }

    if let Some(instructions) = node.data_str("instructions") {
        let result = ctx
            .agent
            .call(&compose_prompt(instructions, &stringify(input)))
            .await?;
        return Ok(json!({"index": index, "input": input, "result": result}));
    }

    let delay = node
        .data
        .get("processing_time")
        .and_then(Value::as_f64)
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok());
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    Ok(json!({
        "index": index,
        "input": input,
        "processed": format!("Processed: {}", stringify(input)),
    }))
}

#[cfg(test)]
mod tests {
    use crate::graph::Node;
    use crate::test_support::Harness;
    use crate::types::NodeKind;
    use crate::workflow::handlers::SlotInputs;
    use serde_json::json;
    use std::time::Duration;

    fn three_inputs() -> SlotInputs {
        SlotInputs::new()
            .with(0, json!("a"))
            .with(1, json!("bad"))
            .with(2, json!("c"))
    }

    #[tokio::test]
    async fn test_unit_fault_is_captured_in_place() {
        let harness = Harness::new(None).await;
        let node = Node::new("p", NodeKind::Parallel).with_data("tool_name", json!("flaky"));

        let value = harness.run(&node, three_inputs()).await.unwrap();
        let entries = value.as_array().unwrap();

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0], json!({"index": 0, "input": "a", "result": "ok: a"}));
        assert_eq!(entries[1]["index"], json!(1));
        assert!(entries[1]["error"].as_str().unwrap().contains("bad"));
        assert_eq!(entries[2], json!({"index": 2, "input": "c", "result": "ok: c"}));
    }

    #[tokio::test]
    async fn test_default_unit_marks_inputs_processed() {
        let harness = Harness::new(None).await;
        let node = Node::new("p", NodeKind::Parallel);
        let inputs = SlotInputs::new().with(0, json!("x")).with(3, json!(5));

        let value = harness.run(&node, inputs).await.unwrap();
        assert_eq!(
            value,
            json!([
                {"index": 0, "input": "x", "processed": "Processed: x"},
                {"index": 1, "input": 5, "processed": "Processed: 5"}
            ])
        );
    }

    #[tokio::test]
    async fn test_agent_units() {
        let harness = Harness::new(None).await;
        let node = Node::new("p", NodeKind::Parallel).with_data("instructions", json!("Tag:"));
        let inputs = SlotInputs::new().with(0, json!("one")).with(1, json!("FAIL two"));

        let value = harness.run(&node, inputs).await.unwrap();
        assert_eq!(value[0]["result"], json!("agent: Tag:\n\none"));
        assert!(value[1].get("error").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_units_run_concurrently() {
        let harness = Harness::new(None).await;
        let node = Node::new("p", NodeKind::Parallel).with_data("processing_time", json!(1.0));
        let started = tokio::time::Instant::now();

        let value = harness.run(&node, three_inputs()).await.unwrap();

        assert_eq!(value.as_array().unwrap().len(), 3);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_no_inputs() {
        let harness = Harness::new(None).await;
        let node = Node::new("p", NodeKind::Parallel);
        assert_eq!(harness.run(&node, SlotInputs::new()).await.unwrap(), json!([]));
    }
}
