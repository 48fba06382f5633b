use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use meridian_contracts::{IdentityContext, MeridianError, Mission, SessionId, ToolDefinition};

use crate::spawner::{SpawnRequest, SubAgentSpawner};
use crate::tool_executor::ToolExecutionResult;
use crate::tool_registry::Tool;

/// Lets an ordinary (non-epic) agent fan out a child session (spec.md §4.5
/// step 4, §4.10; Glossary "Sub-agent"). `tool_executor.rs` injects
/// `_parent_session_id` into every `call_agent` call before dispatch, but
/// this tool derives the parent directly from the `session_id` the executor
/// already passes to every tool, so the injected field is informational only.
pub struct CallAgentTool {
    spawner: Arc<dyn SubAgentSpawner>,
}

impl CallAgentTool {
    pub fn new(spawner: Arc<dyn SubAgentSpawner>) -> Self {
        Self { spawner }
    }
}

#[async_trait]
impl Tool for CallAgentTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "call_agent",
            "Spawn a child agent session to work a sub-mission to completion and return its \
             final answer. Runs synchronously; call several in one turn to fan out in parallel.",
        )
        .with_schema(serde_json::json!({
            "type": "object",
            "required": ["specialist_tag", "mission"],
            "properties": {
                "specialist_tag": {
                    "type": "string",
                    "description": "A registered specialist tag or agent id to delegate to."
                },
                "mission": {
                    "type": "string",
                    "description": "The sub-mission text for the child agent."
                }
            }
        }))
        .parallel()
        .with_timeout_secs(600)
    }

    async fn execute(&self, params: Value, session_id: &SessionId, identity: &IdentityContext) -> ToolExecutionResult {
        let Some(specialist_tag) = params.get("specialist_tag").and_then(Value::as_str) else {
            return ToolExecutionResult::tool_error("call_agent requires a specialist_tag");
        };
        let Some(mission_text) = params.get("mission").and_then(Value::as_str) else {
            return ToolExecutionResult::tool_error("call_agent requires a mission");
        };

        let request = SpawnRequest {
            parent_session_id: session_id.clone(),
            specialist_tag: specialist_tag.to_string(),
            mission: Mission::new(mission_text.to_string()),
            identity: identity.clone(),
        };

        match self.spawner.spawn(request).await {
            Ok(result) => match serde_json::to_value(&result) {
                Ok(value) => ToolExecutionResult::success(value),
                Err(e) => ToolExecutionResult::internal_error(format!(
                    "failed to serialize sub-agent result: {e}"
                )),
            },
            Err(MeridianError::MaxNestingDepth(cap)) => ToolExecutionResult::tool_error(format!(
                "max sub-agent nesting depth ({cap}) exceeded"
            )),
            Err(e) => ToolExecutionResult::internal_error(format!("sub-agent spawn failed: {e}")),
        }
    }
}
