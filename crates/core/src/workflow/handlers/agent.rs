use super::{compose_prompt, stringify, NodeContext};
use crate::error::EngineResult;
use serde_json::Value;

pub(super) async fn run(ctx: &NodeContext<'_>) -> EngineResult<Value> {
    let input_text = ctx.inputs.primary().map(stringify).unwrap_or_default();
    let instructions = ctx.node.data_str("instructions").unwrap_or_default();
    let message = compose_prompt(instructions, &input_text);

    tracing::debug!("Agent node {} sending {} chars", ctx.node.id, message.len());
    let reply = ctx.agent.call(&message).await?;

    Ok(Value::String(reply))
}
