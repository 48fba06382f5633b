// WorkflowCheckpoint / HeartbeatRecord (spec.md §3, §4.13, §4.18).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::SessionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Running,
    WaitingExternal,
    Completed,
    Failed,
}

/// A typed tag for why a workflow is blocked (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockingReason(pub String);

impl BlockingReason {
    pub fn needs_decision() -> Self {
        Self("needs_decision".to_string())
    }
    pub fn missing_supplier_data() -> Self {
        Self("missing_supplier_data".to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowCheckpoint {
    pub run_id: String,
    pub node_id: String,
    pub status: WorkflowStatus,
    pub blocking_reason: Option<BlockingReason>,
    /// JSON Schema describing the pending resume payload.
    pub required_inputs: serde_json::Value,
    pub next_deadline: Option<DateTime<Utc>>,
    /// Engine-specific serialized state to resume from.
    pub state_blob: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl WorkflowCheckpoint {
    pub fn new(
        run_id: impl Into<String>,
        node_id: impl Into<String>,
        required_inputs: serde_json::Value,
        blocking_reason: BlockingReason,
        state_blob: serde_json::Value,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            node_id: node_id.into(),
            status: WorkflowStatus::WaitingExternal,
            blocking_reason: Some(blocking_reason),
            required_inputs,
            next_deadline: None,
            state_blob,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LivenessTag {
    Alive,
    Stale,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRecord {
    pub session_id: SessionId,
    pub timestamp: DateTime<Utc>,
    pub liveness: LivenessTag,
    pub progress_marker: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub session_id: SessionId,
    pub step_id: u64,
    pub marker: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
