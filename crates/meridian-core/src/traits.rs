// Backend traits for the agent loop.
//
// These let the loop run against different backends:
// - in-memory implementations for examples and tests
// - file or database-backed implementations for production (meridian-storage)
// - bus-backed implementations for streaming (meridian-bus)

use async_trait::async_trait;
use futures::future::join_all;

use meridian_contracts::{
    CheckpointRecord, HeartbeatRecord, SessionId, SessionState, StreamEvent, WorkflowCheckpoint,
};

use crate::error::Result;

// ============================================================================
// StateStore - session state with optimistic concurrency (spec.md §4.1)
// ============================================================================

/// Persists `SessionState` with version-checked saves.
///
/// Implementations must reject a `save` whose `expected_version` does not
/// match the currently stored version with
/// [`MeridianError::VersionConflict`](meridian_contracts::MeridianError::VersionConflict),
/// and must never partially apply a save.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self, session_id: &SessionId) -> Result<Option<SessionState>>;

    /// Save `state`, succeeding only if the store's current version for this
    /// session equals `expected_version`.
    async fn save(&self, state: SessionState, expected_version: u64) -> Result<()>;

    async fn delete(&self, session_id: &SessionId) -> Result<()>;

    async fn list(&self) -> Result<Vec<SessionId>>;
}

// ============================================================================
// ToolResultStore - content-addressed large tool output (spec.md §4.2)
// ============================================================================

#[async_trait]
pub trait ToolResultStore: Send + Sync {
    /// Store `value`, returning an opaque handle unique within `session_id`.
    async fn put(&self, session_id: &SessionId, value: &serde_json::Value) -> Result<String>;

    /// Resolve a handle back to its payload. Fails with `HandleNotFound` if
    /// `handle` is unknown within `session_id`.
    async fn fetch(&self, session_id: &SessionId, handle: &str) -> Result<serde_json::Value>;

    async fn delete(&self, session_id: &SessionId, handle: &str) -> Result<()>;
}

// ============================================================================
// HeartbeatStore (spec.md §4.13)
// ============================================================================

#[async_trait]
pub trait HeartbeatStore: Send + Sync {
    async fn beat(
        &self,
        session_id: &SessionId,
        progress_marker: Option<String>,
    ) -> Result<()>;

    async fn get(&self, session_id: &SessionId) -> Result<Option<HeartbeatRecord>>;

    /// Heartbeats whose age exceeds `ttl` — crashed-session candidates for recovery.
    async fn list_stale(&self, ttl: std::time::Duration) -> Result<Vec<HeartbeatRecord>>;
}

// ============================================================================
// CheckpointStore - coarse-grained resumable step markers (spec.md §4.13)
// ============================================================================

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn save(&self, checkpoint: CheckpointRecord) -> Result<()>;

    async fn latest(&self, session_id: &SessionId) -> Result<Option<CheckpointRecord>>;

    async fn list(&self, session_id: &SessionId) -> Result<Vec<CheckpointRecord>>;
}

// ============================================================================
// WorkflowCheckpointStore - wait-gate persistence for resumable workflows
// (spec.md §4.18)
// ============================================================================

#[async_trait]
pub trait WorkflowCheckpointStore: Send + Sync {
    async fn save(&self, checkpoint: WorkflowCheckpoint) -> Result<()>;

    async fn latest(&self, run_id: &str) -> Result<Option<WorkflowCheckpoint>>;
}

// ============================================================================
// EventSink - for streaming events during execution (spec.md §4.16)
// ============================================================================

/// Emits `StreamEvent`s as the loop produces them.
///
/// Implementations can publish to an SSE channel, append to a log, collect
/// in memory for tests, or do nothing.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: StreamEvent) -> Result<()>;

    /// Emit several events; the default dispatches them concurrently.
    async fn emit_batch(&self, events: Vec<StreamEvent>) -> Result<()> {
        let results = join_all(events.into_iter().map(|e| self.emit(e))).await;
        for r in results {
            r?;
        }
        Ok(())
    }
}

/// An `EventSink` that discards everything; used where no subscriber exists.
pub struct NullEventSink;

#[async_trait]
impl EventSink for NullEventSink {
    async fn emit(&self, _event: StreamEvent) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// LlmProvider (spec.md §4.4)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmMessageRole {
    System,
    User,
    Assistant,
    Tool,
}

/// Provider-agnostic message format used for one LLM call.
#[derive(Debug, Clone)]
pub struct LlmMessage {
    pub role: LlmMessageRole,
    pub content: String,
    pub tool_calls: Option<Vec<meridian_contracts::ToolCallRequest>>,
    pub tool_call_id: Option<String>,
}

/// Configuration for a single LLM call.
#[derive(Debug, Clone)]
pub struct LlmCallConfig {
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub tools: Vec<meridian_contracts::ToolDefinition>,
}

impl LlmCallConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: None,
            max_tokens: None,
            tools: Vec::new(),
        }
    }

    pub fn with_tools(mut self, tools: Vec<meridian_contracts::ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }
}

/// The result of one (possibly streamed, then collected) LLM call.
#[derive(Debug, Clone, Default)]
pub struct LlmResponse {
    pub text: String,
    pub tool_calls: Vec<meridian_contracts::ToolCallRequest>,
    pub token_usage: meridian_contracts::TokenUsage,
    pub finish_reason: Option<String>,
}

impl LlmResponse {
    /// True when the model produced no tool calls and some actual content —
    /// a candidate final answer (spec.md §4.8's "content with no attached
    /// tool calls" tie-break). Empty content with no tool calls is a no-op
    /// turn, not a final answer (spec.md §8).
    pub fn is_final_answer(&self) -> bool {
        self.tool_calls.is_empty() && !self.text.trim().is_empty()
    }
}

/// Trait implemented once per model backend (meridian-openai, meridian-anthropic).
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat_completion(
        &self,
        messages: Vec<LlmMessage>,
        config: &LlmCallConfig,
    ) -> Result<LlmResponse>;
}
