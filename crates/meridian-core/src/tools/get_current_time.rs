use async_trait::async_trait;
use serde_json::Value;

use meridian_contracts::{IdentityContext, SessionId, ToolDefinition};

use crate::tool_executor::ToolExecutionResult;
use crate::tool_registry::Tool;

/// Returns the current UTC date and time. Timezone conversion is out of
/// scope; callers asking for another timezone get UTC with that request
/// recorded in the response.
pub struct GetCurrentTimeTool;

#[async_trait]
impl Tool for GetCurrentTimeTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "get_current_time",
            "Get the current date and time in UTC, in iso8601, unix, or human format.",
        )
        .idempotent()
        .parallel()
        .with_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "format": {"type": "string", "enum": ["iso8601", "unix", "human"]}
            }
        }))
    }

    async fn execute(
        &self,
        params: Value,
        _session_id: &SessionId,
        _identity: &IdentityContext,
    ) -> ToolExecutionResult {
        let format = params.get("format").and_then(Value::as_str).unwrap_or("iso8601");
        let now = chrono::Utc::now();
        let result = match format {
            "unix" => serde_json::json!({"timestamp": now.timestamp(), "format": "unix"}),
            "human" => serde_json::json!({
                "datetime": now.format("%A, %B %d, %Y at %H:%M:%S UTC").to_string(),
                "format": "human",
            }),
            _ => serde_json::json!({"datetime": now.to_rfc3339(), "format": "iso8601"}),
        };
        ToolExecutionResult::success(result)
    }
}
