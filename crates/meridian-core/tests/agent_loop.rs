// Integration tests for the reason/act loop (spec.md §4.8) against fake,
// in-memory backends — no storage/provider crate needed, just the traits
// this crate defines.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use meridian_contracts::{
    ExecutionStatus, IdentityContext, MeridianError, Mission, SessionId, SessionState, TokenUsage,
    ToolCallRequest,
};
use meridian_core::error::Result;
use meridian_core::strategies::DirectReactive;
use meridian_core::tools::EchoTool;
use meridian_core::traits::{LlmCallConfig, LlmMessage, LlmProvider, LlmResponse, NullEventSink};
use meridian_core::{AgentLoop, LoopConfig, StateStore, ToolExecutor, ToolRegistry, ToolResultStore};

struct FakeStateStore {
    states: Mutex<HashMap<String, SessionState>>,
    /// When `Some(n)`, the n-th `save` call (0-indexed) fails with a
    /// `VersionConflict` against the already-stored version instead of
    /// succeeding, to exercise `AgentLoop::persist`'s retry path.
    fail_save_once_at: Option<usize>,
    save_calls: AtomicUsize,
}

impl FakeStateStore {
    fn new() -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
            fail_save_once_at: None,
            save_calls: AtomicUsize::new(0),
        }
    }

    fn failing_once_at(at: usize) -> Self {
        Self {
            fail_save_once_at: Some(at),
            ..Self::new()
        }
    }
}

#[async_trait]
impl StateStore for FakeStateStore {
    async fn load(&self, session_id: &SessionId) -> Result<Option<SessionState>> {
        Ok(self.states.lock().unwrap().get(session_id.as_str()).cloned())
    }

    async fn save(&self, state: SessionState, expected_version: u64) -> Result<()> {
        let call = self.save_calls.fetch_add(1, Ordering::SeqCst);
        let mut guard = self.states.lock().unwrap();
        let current_version = guard.get(state.session_id.as_str()).map(|s| s.version).unwrap_or(0);

        if Some(call) == self.fail_save_once_at {
            return Err(MeridianError::VersionConflict {
                expected: expected_version,
                found: current_version,
            });
        }
        if current_version != expected_version {
            return Err(MeridianError::VersionConflict {
                expected: expected_version,
                found: current_version,
            });
        }
        let mut saved = state;
        saved.version = expected_version + 1;
        guard.insert(saved.session_id.as_str().to_string(), saved);
        Ok(())
    }

    async fn delete(&self, session_id: &SessionId) -> Result<()> {
        self.states.lock().unwrap().remove(session_id.as_str());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<SessionId>> {
        Ok(self
            .states
            .lock()
            .unwrap()
            .keys()
            .map(|k| SessionId::from_string(k.clone()))
            .collect())
    }
}

struct FakeToolResultStore {
    values: Mutex<HashMap<String, serde_json::Value>>,
    next_handle: AtomicUsize,
}

impl FakeToolResultStore {
    fn new() -> Self {
        Self {
            values: Mutex::new(HashMap::new()),
            next_handle: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ToolResultStore for FakeToolResultStore {
    async fn put(&self, _session_id: &SessionId, value: &serde_json::Value) -> Result<String> {
        let handle = format!("handle-{}", self.next_handle.fetch_add(1, Ordering::SeqCst));
        self.values.lock().unwrap().insert(handle.clone(), value.clone());
        Ok(handle)
    }

    async fn fetch(&self, _session_id: &SessionId, handle: &str) -> Result<serde_json::Value> {
        self.values
            .lock()
            .unwrap()
            .get(handle)
            .cloned()
            .ok_or_else(|| MeridianError::HandleNotFound(handle.to_string()))
    }

    async fn delete(&self, _session_id: &SessionId, handle: &str) -> Result<()> {
        self.values.lock().unwrap().remove(handle);
        Ok(())
    }
}

/// Plays back a scripted sequence of responses, one per `chat_completion`
/// call, and records the messages/tools it was given.
struct ScriptedProvider {
    responses: Mutex<Vec<LlmResponse>>,
    calls: Mutex<Vec<(Vec<LlmMessage>, LlmCallConfig)>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<LlmResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().rev().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn chat_completion(
        &self,
        messages: Vec<LlmMessage>,
        config: &LlmCallConfig,
    ) -> Result<LlmResponse> {
        self.calls.lock().unwrap().push((messages, config.clone()));
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop()
            .expect("scripted provider ran out of responses"))
    }
}

fn final_answer(text: &str) -> LlmResponse {
    LlmResponse {
        text: text.to_string(),
        tool_calls: Vec::new(),
        token_usage: TokenUsage::default(),
        finish_reason: Some("stop".to_string()),
    }
}

fn tool_call_turn(call_id: &str) -> LlmResponse {
    LlmResponse {
        text: String::new(),
        tool_calls: vec![ToolCallRequest::new(call_id, "echo", serde_json::json!({"text": "hi"}))],
        token_usage: TokenUsage::default(),
        finish_reason: Some("tool_calls".to_string()),
    }
}

fn no_op_turn() -> LlmResponse {
    LlmResponse {
        text: String::new(),
        tool_calls: Vec::new(),
        token_usage: TokenUsage::default(),
        finish_reason: None,
    }
}

fn build_loop(
    state_store: Arc<dyn StateStore>,
    provider: Arc<ScriptedProvider>,
    large_output_threshold: Option<usize>,
) -> AgentLoop {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(EchoTool));
    let mut executor = ToolExecutor::new(Arc::new(registry), Arc::new(FakeToolResultStore::new()));
    if let Some(threshold) = large_output_threshold {
        executor.large_output_threshold = threshold;
    }
    let config = LoopConfig::new("test-agent", "test-model", "You are a test agent.");
    AgentLoop::new(state_store, provider, Arc::new(executor), Arc::new(NullEventSink), config)
}

#[tokio::test]
async fn completes_after_a_tool_call_and_a_final_answer() {
    let state_store: Arc<dyn StateStore> = Arc::new(FakeStateStore::new());
    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_call_turn("call-1"),
        final_answer("all done"),
    ]));
    let agent_loop = build_loop(state_store.clone(), provider.clone(), None);

    let session_id = SessionId::new_root();
    let result = agent_loop
        .execute(
            Mission::new("do the thing"),
            session_id.clone(),
            &DirectReactive,
            &IdentityContext::anonymous(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.status, ExecutionStatus::Completed);
    assert_eq!(result.final_answer.as_deref(), Some("all done"));
    assert_eq!(result.step_count, 2);

    // The first (and only) call after the tool dispatch carries the echo
    // tool's definition — a non-functional loop never offers the model any
    // tool at all.
    let calls = provider.calls.lock().unwrap();
    assert!(calls[0].1.tools.iter().any(|t| t.name == "echo"));
}

#[tokio::test]
async fn no_op_turn_does_not_mistakenly_complete() {
    let state_store: Arc<dyn StateStore> = Arc::new(FakeStateStore::new());
    let provider = Arc::new(ScriptedProvider::new(vec![no_op_turn(), final_answer("done")]));
    let agent_loop = build_loop(state_store, provider, None);

    let result = agent_loop
        .execute(
            Mission::new("do the thing"),
            SessionId::new_root(),
            &DirectReactive,
            &IdentityContext::anonymous(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    // A content-free, tool-call-free turn is a no-op, not a final answer: the
    // loop must take a second step to reach the real final answer.
    assert_eq!(result.status, ExecutionStatus::Completed);
    assert_eq!(result.final_answer.as_deref(), Some("done"));
    assert_eq!(result.step_count, 2);
}

#[tokio::test]
async fn persist_retries_through_a_transient_version_conflict() {
    // The very first save (the tool-call turn) hits a stale-version conflict,
    // as if a concurrent writer had touched this session's state; the loop
    // must reconcile and retry rather than surfacing it as a hard failure.
    let state_store: Arc<dyn StateStore> = Arc::new(FakeStateStore::failing_once_at(0));
    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_call_turn("call-1"),
        final_answer("all done"),
    ]));
    let agent_loop = build_loop(state_store, provider, None);

    let result = agent_loop
        .execute(
            Mission::new("do the thing"),
            SessionId::new_root(),
            &DirectReactive,
            &IdentityContext::anonymous(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.status, ExecutionStatus::Completed);
    assert_eq!(result.final_answer.as_deref(), Some("all done"));
}

#[tokio::test]
async fn pinned_tool_result_handles_reach_the_next_turn() {
    // Force every tool output through the handle store so the context pack
    // has something to carry.
    let state_store: Arc<dyn StateStore> = Arc::new(FakeStateStore::new());
    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_call_turn("call-1"),
        final_answer("all done"),
    ]));
    let agent_loop = build_loop(state_store, provider.clone(), Some(1));

    agent_loop
        .execute(
            Mission::new("do the thing"),
            SessionId::new_root(),
            &DirectReactive,
            &IdentityContext::anonymous(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    let calls = provider.calls.lock().unwrap();
    // The second call (the one producing the final answer) must have seen a
    // pinned-handles system message built from the observation recorded
    // after the first call's tool dispatch.
    let second_call_messages = &calls[1].0;
    assert!(second_call_messages
        .iter()
        .any(|m| m.content.contains("Pinned tool-result handles")));
}
