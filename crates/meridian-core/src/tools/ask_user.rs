use async_trait::async_trait;
use serde_json::Value;

use meridian_contracts::{IdentityContext, SessionId, ToolDefinition};

use crate::tool_executor::ToolExecutionResult;
use crate::tool_registry::Tool;

/// The default wait-gate tool (spec.md §4.8 `awaiting-input`). Calling it
/// does not itself block anything — it is the agent loop that recognizes
/// this tool's name and, on seeing it in a turn's tool calls, persists state
/// and returns control to the caller instead of looping back into
/// `calling-llm`.
pub struct AskUserTool;

#[async_trait]
impl Tool for AskUserTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "ask_user",
            "Ask the user a question and wait for their reply before continuing.",
        )
        .with_schema(serde_json::json!({
            "type": "object",
            "required": ["question"],
            "properties": {
                "question": {"type": "string"},
                "required_inputs_schema": {"type": "object"}
            }
        }))
    }

    async fn execute(
        &self,
        params: Value,
        _session_id: &SessionId,
        _identity: &IdentityContext,
    ) -> ToolExecutionResult {
        let Some(question) = params.get("question").and_then(Value::as_str) else {
            return ToolExecutionResult::tool_error("ask_user requires a question");
        };
        let schema = params
            .get("required_inputs_schema")
            .cloned()
            .unwrap_or_else(|| serde_json::json!({"type": "object"}));
        ToolExecutionResult::success(serde_json::json!({
            "question": question,
            "required_inputs_schema": schema,
        }))
    }
}
