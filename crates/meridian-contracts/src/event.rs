// StreamEvent (spec.md §3, §6 "Event payloads").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::execution::TokenUsage;
use crate::session::SessionId;
use crate::tool::ToolCallRequest;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StreamEventPayload {
    Thought {
        content: String,
    },
    Action {
        tool_calls: Vec<ToolCallRequest>,
    },
    Observation {
        tool_call_id: String,
        success: bool,
        preview: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        handle: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    PlanUpdated {
        #[cfg_attr(feature = "openapi", schema(value_type = Object))]
        plan_snapshot: serde_json::Value,
    },
    SubAgentSpawned {
        child_session_id: String,
        specialist: String,
        mission_preview: String,
    },
    SubAgentCompleted {
        child_session_id: String,
        success: bool,
        steps_taken: usize,
    },
    EpicEscalation {
        complexity: String,
        confidence: f64,
        reason: String,
    },
    RoundStarted {
        run_id: String,
        round_number: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        task_count: Option<usize>,
    },
    RoundCompleted {
        run_id: String,
        round_number: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        judge_decision: Option<String>,
    },
    AwaitingInput {
        question: String,
        #[cfg_attr(feature = "openapi", schema(value_type = Object))]
        required_inputs_schema: serde_json::Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        run_id: Option<String>,
    },
    /// A paused workflow run was re-entered at `node_id` (spec.md §4.18).
    WorkflowResumed {
        node_id: String,
        #[cfg_attr(feature = "openapi", schema(value_type = Object))]
        state_blob: serde_json::Value,
        #[cfg_attr(feature = "openapi", schema(value_type = Object))]
        payload: serde_json::Value,
    },
    FinalAnswer {
        content: String,
        token_usage: TokenUsage,
    },
    Error {
        kind: String,
        message: String,
    },
}

/// A single typed, ordered event emitted by the executor (spec.md §3, §6).
///
/// Ordering: monotonic by `(session_id, step_id)` (spec.md §4.16).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StreamEvent {
    pub session_id: SessionId,
    pub step_id: u64,
    pub timestamp: DateTime<Utc>,
    pub payload: StreamEventPayload,
}

impl StreamEvent {
    pub fn new(session_id: SessionId, step_id: u64, payload: StreamEventPayload) -> Self {
        Self {
            session_id,
            step_id,
            timestamp: Utc::now(),
            payload,
        }
    }
}
