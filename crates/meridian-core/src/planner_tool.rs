// Planner tool: plan mutation exposed to the model as an ordinary tool
// (spec.md §4.6).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use meridian_contracts::{IdentityContext, Plan, PlanItem, SessionId, ToolDefinition};

use crate::tool_executor::ToolExecutionResult;
use crate::tool_registry::Tool;
use crate::traits::StateStore;

const MAX_VERSION_CONFLICT_RETRIES: u32 = 3;

/// Mutates the plan attached to the current session. The agent loop is
/// responsible for emitting the `plan-updated` stream event once it observes
/// a successful result from this tool (it alone knows the current step id).
pub struct PlannerTool {
    state_store: Arc<dyn StateStore>,
}

impl PlannerTool {
    pub fn new(state_store: Arc<dyn StateStore>) -> Self {
        Self { state_store }
    }

    async fn mutate(
        &self,
        session_id: &SessionId,
        apply: impl Fn(&mut Plan) -> Result<(), meridian_contracts::PlanError>,
    ) -> ToolExecutionResult {
        for _ in 0..MAX_VERSION_CONFLICT_RETRIES {
            let state = match self.state_store.load(session_id).await {
                Ok(Some(s)) => s,
                Ok(None) => return ToolExecutionResult::tool_error("session not found"),
                Err(e) => return ToolExecutionResult::internal_error(e.to_string()),
            };
            let expected_version = state.version;
            let mut state = state;
            let mut plan = state.plan.unwrap_or_default();
            if let Err(e) = apply(&mut plan) {
                return ToolExecutionResult::tool_error(e.to_string());
            }
            let snapshot = serde_json::to_value(&plan).unwrap_or(Value::Null);
            state.plan = Some(plan);
            match self.state_store.save(state, expected_version).await {
                Ok(()) => return ToolExecutionResult::success(snapshot),
                Err(meridian_contracts::MeridianError::VersionConflict { .. }) => continue,
                Err(e) => return ToolExecutionResult::internal_error(e.to_string()),
            }
        }
        ToolExecutionResult::internal_error("plan save conflicted after retries")
    }

    async fn get(&self, session_id: &SessionId) -> ToolExecutionResult {
        match self.state_store.load(session_id).await {
            Ok(Some(state)) => {
                let plan = state.plan.unwrap_or_default();
                ToolExecutionResult::success(serde_json::to_value(&plan).unwrap_or(Value::Null))
            }
            Ok(None) => ToolExecutionResult::tool_error("session not found"),
            Err(e) => ToolExecutionResult::internal_error(e.to_string()),
        }
    }
}

#[async_trait]
impl Tool for PlannerTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "planner",
            "Create and mutate the structured plan attached to the current session: \
             create, add_item, update_status, reorder, get.",
        )
        .idempotent()
        .with_schema(serde_json::json!({
            "type": "object",
            "required": ["operation"],
            "properties": {
                "operation": {"type": "string", "enum": ["create", "add_item", "update_status", "reorder", "get"]},
                "items": {"type": "array"},
                "position": {"type": "integer"},
                "description": {"type": "string"},
                "acceptance_criteria": {"type": "string"},
                "dependencies": {"type": "array", "items": {"type": "integer"}},
                "status": {"type": "string"},
                "order": {"type": "array", "items": {"type": "integer"}}
            }
        }))
    }

    async fn execute(
        &self,
        params: Value,
        session_id: &SessionId,
        _identity: &IdentityContext,
    ) -> ToolExecutionResult {
        let operation = params.get("operation").and_then(Value::as_str).unwrap_or("");
        match operation {
            "create" => {
                let items: Vec<PlanItem> = params
                    .get("items")
                    .and_then(|v| serde_json::from_value(v.clone()).ok())
                    .unwrap_or_default();
                self.mutate(session_id, move |plan| {
                    *plan = Plan::new(items.clone());
                    Ok(())
                })
                .await
            }
            "add_item" => {
                let Some(position) = params.get("position").and_then(Value::as_u64) else {
                    return ToolExecutionResult::tool_error("add_item requires a position");
                };
                let description = params
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string();
                let dependencies: Vec<usize> = params
                    .get("dependencies")
                    .and_then(|v| serde_json::from_value(v.clone()).ok())
                    .unwrap_or_default();
                self.mutate(session_id, move |plan| {
                    let item = PlanItem::new(position as usize, description.clone())
                        .with_dependencies(dependencies.clone());
                    plan.add_item(item)
                })
                .await
            }
            "update_status" => {
                let (Some(position), Some(status_str)) = (
                    params.get("position").and_then(Value::as_u64),
                    params.get("status").and_then(Value::as_str),
                ) else {
                    return ToolExecutionResult::tool_error("update_status requires position and status");
                };
                let Ok(status) = serde_json::from_value(Value::String(status_str.to_string())) else {
                    return ToolExecutionResult::tool_error(format!("unknown status: {status_str}"));
                };
                self.mutate(session_id, move |plan| {
                    plan.update_status(position as usize, status)
                })
                .await
            }
            "reorder" => {
                let Some(order) = params
                    .get("order")
                    .and_then(|v| serde_json::from_value::<Vec<usize>>(v.clone()).ok())
                else {
                    return ToolExecutionResult::tool_error("reorder requires an order array");
                };
                self.mutate(session_id, move |plan| plan.reorder(order.clone()))
                    .await
            }
            "get" => self.get(session_id).await,
            other => ToolExecutionResult::tool_error(format!("unknown planner operation: {other}")),
        }
    }
}
