// Top-level mission executor (spec.md §4.16): the single entry point used
// by both the CLI and the HTTP API. Routes a mission to the ordinary agent
// pipeline or the epic orchestrator, synchronously or with a live event
// stream.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use meridian_contracts::{
    ExecutionResult, ExecutionStatus, IdentityContext, MeridianError, Mission, SessionId,
    StreamEvent, StreamEventPayload, TokenUsage,
};
use meridian_core::error::Result;
use meridian_core::{CheckpointStore, DefinitionRegistry, EventSink, MessageBus, SubAgentSpawner};
use meridian_epic::{classify_result_is_complex, AutoEpicClassifier, EpicOrchestrator};

use crate::event_sink::session_topic;
use crate::profile::{ExecutionMode, ExecutionProfile};

/// A subscribed, still-running mission: the caller drains `subscription` for
/// ordered `StreamEvent`s while `handle` resolves in the background to the
/// same `ExecutionResult` `execute_mission` would have returned directly.
pub struct StreamingExecution {
    pub subscription: Box<dyn meridian_core::BusSubscription>,
    pub handle: tokio::task::JoinHandle<Result<ExecutionResult>>,
    pub cancel: CancellationToken,
}

pub struct ExecutorService {
    registry: Arc<DefinitionRegistry>,
    factory: Arc<meridian_core::AgentFactory>,
    bus: Arc<dyn MessageBus>,
    spawner: Arc<dyn SubAgentSpawner>,
    checkpoints: Arc<dyn CheckpointStore>,
}

impl ExecutorService {
    pub fn new(
        registry: Arc<DefinitionRegistry>,
        factory: Arc<meridian_core::AgentFactory>,
        bus: Arc<dyn MessageBus>,
        spawner: Arc<dyn SubAgentSpawner>,
        checkpoints: Arc<dyn CheckpointStore>,
    ) -> Self {
        Self {
            registry,
            factory,
            bus,
            spawner,
            checkpoints,
        }
    }

    fn event_sink(&self) -> Arc<dyn EventSink> {
        self.factory.event_sink.clone()
    }

    async fn decide_mode(&self, mission: &Mission, profile: &ExecutionProfile, session_id: &SessionId) -> Result<ExecutionMode> {
        if let Some(mode) = profile.forced_mode {
            return Ok(mode);
        }
        if !profile.auto_epic {
            return Ok(ExecutionMode::Simple);
        }

        let classifier = AutoEpicClassifier::new(self.factory.llm_provider.clone(), profile.classifier_model.clone())
            .with_confidence_threshold(profile.classifier_confidence_threshold);
        let verdict = classifier.classify(mission).await;

        let _ = self
            .event_sink()
            .emit(StreamEvent::new(
                session_id.clone(),
                0,
                StreamEventPayload::EpicEscalation {
                    complexity: if classify_result_is_complex(&verdict) { "complex".to_string() } else { "simple".to_string() },
                    confidence: verdict.confidence as f64,
                    reason: verdict.reason.clone(),
                },
            ))
            .await;

        Ok(if classify_result_is_complex(&verdict) {
            ExecutionMode::Epic
        } else {
            ExecutionMode::Simple
        })
    }

    async fn run_simple(
        &self,
        mission: Mission,
        profile: &ExecutionProfile,
        session_id: SessionId,
        identity: &IdentityContext,
        cancel: CancellationToken,
    ) -> Result<ExecutionResult> {
        let definition = self.registry.get(&profile.agent_id).cloned().ok_or_else(|| {
            MeridianError::Internal(anyhow::anyhow!("no agent definition for id {}", profile.agent_id))
        })?;
        let built = self.factory.build(&definition);
        built
            .agent_loop
            .execute(mission, session_id, built.strategy.as_ref(), identity, cancel)
            .await
    }

    async fn run_epic(&self, mission: Mission, profile: &ExecutionProfile) -> Result<ExecutionResult> {
        let orchestrator = EpicOrchestrator::new(
            self.bus.clone(),
            self.spawner.clone(),
            self.checkpoints.clone(),
            self.event_sink(),
            profile.epic.clone(),
        );
        let run = orchestrator.run(mission).await?;

        let status = match run.latest_judge_decision {
            Some(meridian_contracts::JudgeDecision::Complete) => ExecutionStatus::Completed,
            _ => ExecutionStatus::MaxStepsReached,
        };
        Ok(ExecutionResult {
            status,
            final_answer: Some(run.current_state),
            error_message: None,
            error_kind: None,
            step_count: run.round_number as usize,
            token_usage: TokenUsage::default(),
        })
    }

    /// Runs `mission` to completion and returns the final result.
    pub async fn execute_mission(
        &self,
        mission: Mission,
        profile: &ExecutionProfile,
        session_id: Option<SessionId>,
        identity: &IdentityContext,
        cancel: CancellationToken,
    ) -> Result<ExecutionResult> {
        let session_id = session_id.unwrap_or_else(SessionId::new_root);
        match self.decide_mode(&mission, profile, &session_id).await? {
            ExecutionMode::Simple => {
                self.run_simple(mission, profile, session_id, identity, cancel).await
            }
            ExecutionMode::Epic => self.run_epic(mission, profile).await,
        }
    }

    /// Same routing as `execute_mission`, but returns a live subscription to
    /// the session's event topic alongside a background task driving the
    /// run. The subscription is established before the run starts so no
    /// early events are missed (spec.md §4.16 ordering guarantee).
    pub async fn execute_mission_streaming(
        self: &Arc<Self>,
        mission: Mission,
        profile: ExecutionProfile,
        session_id: Option<SessionId>,
        identity: IdentityContext,
    ) -> Result<StreamingExecution> {
        let session_id = session_id.unwrap_or_else(SessionId::new_root);
        let subscription = self.bus.subscribe(&session_topic(&session_id)).await?;
        let cancel = CancellationToken::new();

        let service = self.clone();
        let task_cancel = cancel.clone();
        let task_session_id = session_id.clone();
        let handle = tokio::spawn(async move {
            service
                .execute_mission(mission, &profile, Some(task_session_id), &identity, task_cancel)
                .await
        });

        Ok(StreamingExecution {
            subscription,
            handle,
            cancel,
        })
    }
}
