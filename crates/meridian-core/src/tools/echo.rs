use async_trait::async_trait;
use serde_json::Value;

use meridian_contracts::{IdentityContext, SessionId, ToolDefinition};

use crate::tool_executor::ToolExecutionResult;
use crate::tool_registry::Tool;

/// Echoes its input back. Used in tests and as a harmless smoke-test tool.
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("echo", "Echo the given text back unchanged.")
            .idempotent()
            .parallel()
            .with_schema(serde_json::json!({
                "type": "object",
                "required": ["text"],
                "properties": {"text": {"type": "string"}}
            }))
    }

    async fn execute(
        &self,
        params: Value,
        _session_id: &SessionId,
        _identity: &IdentityContext,
    ) -> ToolExecutionResult {
        match params.get("text").and_then(Value::as_str) {
            Some(text) => ToolExecutionResult::success(serde_json::json!({"text": text})),
            None => ToolExecutionResult::tool_error("missing required parameter: text"),
        }
    }
}
