// Agent loop: the reason/act state machine (spec.md §4.8).

use std::collections::HashSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use meridian_contracts::{
    ExecutionResult, IdentityContext, MeridianError, Message, Mission, PendingQuestion, Plan,
    SessionId, SessionState, StreamEvent, StreamEventPayload, TokenUsage,
};

use crate::budget::{BudgetDecision, TokenBudgeter};
use crate::context::ContextBuilder;
use crate::error::Result;
use crate::history::MessageHistoryManager;
use crate::strategies::{PlanningStrategy, StrategyAction, StrategyContext};
use crate::tool_executor::ToolExecutor;
use crate::traits::{EventSink, LlmCallConfig, LlmMessage, LlmMessageRole, LlmProvider, StateStore};

/// The state machine's named states (spec.md §4.8). Exposed mainly for
/// tracing and tests; the loop does not materialize a literal enum value at
/// every transition, but every branch below corresponds to exactly one of
/// these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Init,
    BuildingPrompt,
    CallingLlm,
    DispatchingTools,
    PostObservation,
    AwaitingInput,
    FinishStep,
    TerminalCompleted,
    TerminalFailed,
    TerminalMaxSteps,
    TerminalCancelled,
}

pub type LoopOutcome = ExecutionResult;

const DEFAULT_PERSIST_RETRIES: usize = 5;

#[derive(Clone)]
pub struct LoopConfig {
    pub agent_id: String,
    pub model: String,
    pub base_system_prompt: String,
    pub specialist_index: Vec<String>,
    pub reflection_model: Option<String>,
    pub max_steps: usize,
    /// Tool names that, when the last call in a turn, transition the loop to
    /// `awaiting-input` instead of dispatching (spec.md §4.8).
    pub wait_gate_tools: HashSet<String>,
}

impl LoopConfig {
    pub fn new(agent_id: impl Into<String>, model: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            model: model.into(),
            base_system_prompt: system_prompt.into(),
            specialist_index: Vec::new(),
            reflection_model: None,
            max_steps: 30,
            wait_gate_tools: HashSet::from(["ask_user".to_string()]),
        }
    }
}

/// Drives one session's mission to a terminal `ExecutionResult`.
pub struct AgentLoop {
    state_store: Arc<dyn StateStore>,
    llm_provider: Arc<dyn LlmProvider>,
    tool_executor: Arc<ToolExecutor>,
    event_sink: Arc<dyn EventSink>,
    budgeter: TokenBudgeter,
    history: MessageHistoryManager,
    context_builder: ContextBuilder,
    config: LoopConfig,
}

impl AgentLoop {
    pub fn new(
        state_store: Arc<dyn StateStore>,
        llm_provider: Arc<dyn LlmProvider>,
        tool_executor: Arc<ToolExecutor>,
        event_sink: Arc<dyn EventSink>,
        config: LoopConfig,
    ) -> Self {
        Self {
            state_store,
            llm_provider,
            tool_executor,
            event_sink,
            budgeter: TokenBudgeter::default(),
            history: MessageHistoryManager::default(),
            context_builder: ContextBuilder::default(),
            config,
        }
    }

    #[instrument(skip(self, strategy, cancel), fields(session_id = %session_id))]
    pub async fn execute(
        &self,
        mission: Mission,
        session_id: SessionId,
        strategy: &dyn PlanningStrategy,
        identity: &IdentityContext,
        cancel: CancellationToken,
    ) -> Result<ExecutionResult> {
        // init
        let mut state = match self.state_store.load(&session_id).await? {
            Some(state) => {
                match self.recover_partial_dispatch(&state.messages, &session_id).await {
                    Some(recovered) => SessionState {
                        messages: recovered,
                        ..state
                    },
                    None => state,
                }
            }
            None => {
                let mut state = SessionState::new(session_id.clone(), self.config.agent_id.clone());
                let base_prompt = self
                    .context_builder
                    .system_prompt(&self.config.base_system_prompt, &self.config.specialist_index);
                let system_prompt = strategy.augment_system_prompt(&base_prompt);
                state.messages.push(Message::system(system_prompt));
                state.messages.push(Message::user(mission.to_string()));
                state
            }
        };

        if strategy.wants_initial_plan() && state.plan.is_none() {
            state.plan = Some(Plan::default());
        }

        let mut step_count = state
            .messages
            .iter()
            .filter(|m| m.role == meridian_contracts::MessageRole::Assistant)
            .count();
        let mut step_id: u64 = step_count as u64;
        let mut total_usage = TokenUsage::default();

        loop {
            if cancel.is_cancelled() {
                state.version = self.persist(state.clone()).await?;
                return Ok(ExecutionResult::cancelled(step_count));
            }
            if step_count >= self.config.max_steps {
                state.version = self.persist(state.clone()).await?;
                return Ok(ExecutionResult::max_steps(step_count));
            }

            // building-prompt
            self.preflight_budget(&mut state.messages).await;

            // calling-llm
            let mut llm_messages = to_llm_messages(&state.messages);
            let system_prefix_len = llm_messages
                .iter()
                .take_while(|m| m.role == LlmMessageRole::System)
                .count();
            let mut turn_context = Vec::new();
            if let Some(block) = self.context_builder.plan_status_block(state.plan.as_ref()) {
                turn_context.push(LlmMessage {
                    role: LlmMessageRole::System,
                    content: block,
                    tool_calls: None,
                    tool_call_id: None,
                });
            }
            if let Some(pack) = self.context_builder.context_pack(&state.tool_result_handles) {
                turn_context.push(LlmMessage {
                    role: LlmMessageRole::System,
                    content: format!("Pinned tool-result handles from this session:\n{pack}"),
                    tool_calls: None,
                    tool_call_id: None,
                });
            }
            for (offset, message) in turn_context.into_iter().enumerate() {
                llm_messages.insert(system_prefix_len + offset, message);
            }
            let llm_config = LlmCallConfig::new(self.config.model.clone())
                .with_tools(self.tool_executor.registry.definitions());
            let response = tokio::select! {
                _ = cancel.cancelled() => {
                    state.version = self.persist(state.clone()).await?;
                    return Ok(ExecutionResult::cancelled(step_count));
                }
                result = self.llm_provider.chat_completion(llm_messages, &llm_config) => result?,
            };
            step_count += 1;
            step_id += 1;
            total_usage.add(&response.token_usage);

            let assistant_message = if response.tool_calls.is_empty() {
                Message::assistant(response.text.clone())
            } else {
                Message::assistant_with_tool_calls(response.text.clone(), response.tool_calls.clone())
            };
            self.history.append(&mut state.messages, assistant_message);
            self.emit(
                &session_id,
                step_id,
                StreamEventPayload::Thought {
                    content: response.text.clone(),
                },
            )
            .await;

            if response.tool_calls.is_empty() && response.text.trim().is_empty() {
                // no-op turn (spec.md §8): neither a final answer nor a tool
                // call. Persist and loop rather than mis-terminating.
                state.version = self.persist(state.clone()).await?;
                continue;
            }

            if response.is_final_answer() {
                let ctx = StrategyContext {
                    mission: &mission,
                    plan: state.plan.as_ref(),
                    final_text: &response.text,
                    llm_provider: self.llm_provider.as_ref(),
                    reflection_model: self.config.reflection_model.as_deref(),
                };
                match strategy.decide_after_final_answer(&ctx).await? {
                    StrategyAction::Complete => {
                        state.version = self.persist(state.clone()).await?;
                        self.emit(
                            &session_id,
                            step_id,
                            StreamEventPayload::FinalAnswer {
                                content: response.text.clone(),
                                token_usage: total_usage.clone(),
                            },
                        )
                        .await;
                        return Ok(ExecutionResult::completed(response.text, step_count, total_usage));
                    }
                    StrategyAction::Continue => {
                        if let Some(plan) = state.plan.as_mut() {
                            strategy.advance_plan(plan);
                        }
                    }
                    StrategyAction::Replan => {
                        state.plan = Some(Plan::default());
                    }
                }
                state.version = self.persist(state.clone()).await?;
                continue;
            }

            // awaiting-input: last call is a wait-gate tool.
            if let Some(last_call) = response.tool_calls.last() {
                if self.config.wait_gate_tools.contains(&last_call.name) {
                    let outcome = self
                        .tool_executor
                        .execute_batch(vec![last_call.clone()], &session_id, identity)
                        .await;
                    let result = &outcome[0];
                    let question = result
                        .output
                        .as_ref()
                        .and_then(|v| v.get("question"))
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string();
                    let schema = result
                        .output
                        .as_ref()
                        .and_then(|v| v.get("required_inputs_schema"))
                        .cloned()
                        .unwrap_or(serde_json::json!({"type": "object"}));
                    self.history
                        .append(&mut state.messages, Message::tool_result(last_call.id.clone(), result));
                    state.pending_question = Some(PendingQuestion {
                        question: question.clone(),
                        required_inputs: schema.clone(),
                    });
                    state.version = self.persist(state.clone()).await?;
                    self.emit(
                        &session_id,
                        step_id,
                        StreamEventPayload::AwaitingInput {
                            question,
                            required_inputs_schema: schema,
                            run_id: None,
                        },
                    )
                    .await;
                    return Ok(ExecutionResult::waiting_external(step_count));
                }
            }

            // dispatching-tools
            self.emit(
                &session_id,
                step_id,
                StreamEventPayload::Action {
                    tool_calls: response.tool_calls.clone(),
                },
            )
            .await;
            let results = tokio::select! {
                _ = cancel.cancelled() => {
                    state.version = self.persist(state.clone()).await?;
                    return Ok(ExecutionResult::cancelled(step_count));
                }
                results = self.tool_executor.execute_batch(response.tool_calls.clone(), &session_id, identity) => results,
            };

            // post-observation
            let mut plan_mutated = false;
            for (call, result) in response.tool_calls.iter().zip(results.iter()) {
                if call.name == "planner" && result.success {
                    plan_mutated = true;
                }
                self.history
                    .append(&mut state.messages, Message::tool_result(call.id.clone(), result));
                if let Some(handle) = &result.handle {
                    if !state.tool_result_handles.contains(handle) {
                        state.tool_result_handles.push(handle.clone());
                    }
                }
                self.emit(
                    &session_id,
                    step_id,
                    StreamEventPayload::Observation {
                        tool_call_id: result.tool_call_id.clone(),
                        success: result.success,
                        preview: result
                            .preview
                            .clone()
                            .unwrap_or_else(|| result.error.clone().unwrap_or_default()),
                        handle: result.handle.clone(),
                        error: result.error.clone(),
                    },
                )
                .await;
            }
            if plan_mutated {
                if let Some(last_success) = response
                    .tool_calls
                    .iter()
                    .zip(results.iter())
                    .filter(|(c, r)| c.name == "planner" && r.success)
                    .last()
                {
                    if let Some(output) = &last_success.1.output {
                        if let Ok(plan) = serde_json::from_value::<Plan>(output.clone()) {
                            state.plan = Some(plan.clone());
                            self.emit(
                                &session_id,
                                step_id,
                                StreamEventPayload::PlanUpdated {
                                    plan_snapshot: output.clone(),
                                },
                            )
                            .await;
                        }
                    }
                }
            }

            state.version = self.persist(state.clone()).await?;
        }
    }

    /// Preflight budget check (spec.md §4.7) and message-count summarization
    /// (spec.md §4.3): whichever trigger fires first routes through the same
    /// LLM summarization pass, falling back to straight truncation only if
    /// that call itself fails or the result is still over budget.
    async fn preflight_budget(&self, messages: &mut Vec<Message>) {
        let decision = self.budgeter.decide(messages, 0);
        if matches!(decision, BudgetDecision::ShouldCompress | BudgetDecision::OverBudget) {
            for message in messages.iter_mut() {
                *message = self.budgeter.sanitize_message(message, self.history.message_char_cap);
            }
        }
        let should_summarize = self.history.needs_summarization(messages)
            || matches!(decision, BudgetDecision::OverBudget)
            || self.budgeter.is_over_budget(messages, 0);
        if should_summarize {
            self.summarize_history(messages).await;
        }
    }

    /// Summarize the message prefix via an LLM call, replacing it with a
    /// single synthetic assistant message (spec.md §4.3). Falls back to
    /// discarding the prefix outright if the call fails or returns nothing.
    async fn summarize_history(&self, messages: &mut Vec<Message>) {
        let input = self.history.summarization_input(messages);
        if input.is_empty() {
            return;
        }
        let prompt = format!(
            "Summarize the following conversation turns concisely, preserving any facts, \
             decisions, and open items a continuation would still need:\n\n{}",
            input.join("\n")
        );
        let model = self
            .config
            .reflection_model
            .clone()
            .unwrap_or_else(|| self.config.model.clone());
        let call = self
            .llm_provider
            .chat_completion(
                vec![LlmMessage {
                    role: LlmMessageRole::User,
                    content: prompt,
                    tool_calls: None,
                    tool_call_id: None,
                }],
                &LlmCallConfig::new(model),
            )
            .await;
        match call {
            Ok(response) if !response.text.trim().is_empty() => {
                *messages = self.history.summarize(messages, response.text);
            }
            Ok(_) => {
                warn!("summarization call returned no text; falling back to truncation");
                *messages = self.history.fallback_truncate(messages);
            }
            Err(e) => {
                warn!(error = %e, "summarization call failed; falling back to truncation");
                *messages = self.history.fallback_truncate(messages);
            }
        }
    }

    /// Detects a tool call awaiting an observation from before a crash and
    /// either re-dispatches it (if idempotent) or marks it `PartialRecovery`
    /// (spec.md §4.8 resume tie-break).
    async fn recover_partial_dispatch(
        &self,
        messages: &[Message],
        session_id: &SessionId,
    ) -> Option<Vec<Message>> {
        let last = messages.last()?;
        if last.role != meridian_contracts::MessageRole::Assistant {
            return None;
        }
        let pending: Vec<_> = last.tool_calls.clone().unwrap_or_default();
        if pending.is_empty() {
            return None;
        }
        let answered: HashSet<String> = messages
            .iter()
            .filter_map(|m| m.tool_call_id.clone())
            .collect();
        let orphans: Vec<_> = pending.into_iter().filter(|c| !answered.contains(&c.id)).collect();
        if orphans.is_empty() {
            return None;
        }

        let mut extended = messages.clone();
        for call in orphans {
            let idempotent = self
                .tool_executor
                .registry
                .get(&call.name)
                .map(|t| t.definition().idempotent)
                .unwrap_or(false);
            if idempotent {
                let identity = IdentityContext::anonymous();
                let results = self
                    .tool_executor
                    .execute_batch(vec![call.clone()], session_id, &identity)
                    .await;
                extended.push(Message::tool_result(call.id.clone(), &results[0]));
            } else {
                warn!(tool_call_id = %call.id, "non-idempotent tool call orphaned by crash");
                let failure = meridian_contracts::ToolResult::failure(
                    call.id.clone(),
                    "tool call was mid-dispatch when the session stopped and is not idempotent",
                    meridian_contracts::ToolErrorKind::PartialRecovery,
                );
                extended.push(Message::tool_result(call.id.clone(), &failure));
            }
        }
        Some(extended)
    }

    /// Save `state`, reconciling bounded (spec.md §7) optimistic-concurrency
    /// conflicts by reloading the store's current version and retrying on it.
    /// This session is the sole writer to its own state, so reconciliation is
    /// just re-targeting the save at the latest version; a conflict here
    /// comes from a concurrent checkpoint/heartbeat writer racing the same
    /// session, not from two loops mutating the same turn.
    async fn persist(&self, mut state: SessionState) -> Result<u64> {
        let session_id = state.session_id.clone();
        for attempt in 0..DEFAULT_PERSIST_RETRIES {
            let expected_version = state.version;
            match self.state_store.save(state.clone(), expected_version).await {
                Ok(()) => return Ok(expected_version + 1),
                Err(MeridianError::VersionConflict { found, .. }) => {
                    warn!(
                        session_id = %session_id,
                        attempt,
                        found,
                        "version conflict on persist, retrying against latest version"
                    );
                    state.version = found;
                }
                Err(e) => return Err(e),
            }
        }
        Err(MeridianError::PersistenceConflict(session_id.to_string()))
    }

    async fn emit(&self, session_id: &SessionId, step_id: u64, payload: StreamEventPayload) {
        if let Err(e) = self
            .event_sink
            .emit(StreamEvent::new(session_id.clone(), step_id, payload))
            .await
        {
            warn!(error = %e, "failed to emit stream event");
        }
    }
}

fn to_llm_messages(messages: &[Message]) -> Vec<LlmMessage> {
    messages
        .iter()
        .map(|m| LlmMessage {
            role: match m.role {
                meridian_contracts::MessageRole::System => LlmMessageRole::System,
                meridian_contracts::MessageRole::User => LlmMessageRole::User,
                meridian_contracts::MessageRole::Assistant => LlmMessageRole::Assistant,
                meridian_contracts::MessageRole::Tool => LlmMessageRole::Tool,
            },
            content: m.text(),
            tool_calls: m.tool_calls.clone(),
            tool_call_id: m.tool_call_id.clone(),
        })
        .collect()
}

#[allow(dead_code)]
fn log_state(state: LoopState) {
    info!(?state, "loop transition");
}
