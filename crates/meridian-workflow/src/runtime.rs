// Resumable workflow runtime (spec.md §4.18): pauses a workflow at a wait
// gate and resumes it on an inbound reply.

use std::sync::Arc;

use async_trait::async_trait;

use meridian_contracts::{BlockingReason, MeridianError, WorkflowCheckpoint, WorkflowStatus};
use meridian_core::error::Result;
use meridian_core::WorkflowCheckpointStore;

use crate::dedup::{dedup_key, ResumeDedup, SenderMetadata};

/// Delegate for actually dispatching a wait-gate question (chat, email,
/// webhook...); the runtime only knows it needs to ask, not how.
#[async_trait]
pub trait CommunicationGateway: Send + Sync {
    async fn send_request(
        &self,
        run_id: &str,
        recipient: &str,
        question: &str,
        required_inputs: &serde_json::Value,
    ) -> Result<()>;
}

/// Re-enters the paused engine at a node once a resume payload is accepted.
#[async_trait]
pub trait WorkflowEngine: Send + Sync {
    async fn resume_at(
        &self,
        run_id: &str,
        node_id: &str,
        state_blob: serde_json::Value,
        payload: serde_json::Value,
    ) -> Result<()>;
}

/// Invoked when a checkpoint's `next_deadline` has passed without a resume.
#[async_trait]
pub trait EscalationHook: Send + Sync {
    async fn escalate(&self, checkpoint: &WorkflowCheckpoint) -> Result<()>;
}

#[derive(Debug, Clone)]
pub enum ResumeOutcome {
    /// The payload validated and the engine was re-entered at `node_id`.
    Applied { node_id: String },
    /// This event's dedup key was already seen; no action taken.
    Duplicate,
    /// Payload failed schema validation; a refined follow-up was sent and
    /// the checkpoint remains `waiting-external`.
    SchemaMismatch { reason: String },
}

/// Merges a resume payload's top-level fields into the saved state blob.
/// Payload fields win on conflict.
fn merge_state(state_blob: &serde_json::Value, payload: &serde_json::Value) -> serde_json::Value {
    match (state_blob, payload) {
        (serde_json::Value::Object(base), serde_json::Value::Object(incoming)) => {
            let mut merged = base.clone();
            for (k, v) in incoming {
                merged.insert(k.clone(), v.clone());
            }
            serde_json::Value::Object(merged)
        }
        _ => payload.clone(),
    }
}

pub struct ResumableWorkflowRuntime {
    checkpoints: Arc<dyn WorkflowCheckpointStore>,
    gateway: Arc<dyn CommunicationGateway>,
    engine: Arc<dyn WorkflowEngine>,
    escalation_hook: Option<Arc<dyn EscalationHook>>,
    dedup: ResumeDedup,
}

impl ResumableWorkflowRuntime {
    pub fn new(
        checkpoints: Arc<dyn WorkflowCheckpointStore>,
        gateway: Arc<dyn CommunicationGateway>,
        engine: Arc<dyn WorkflowEngine>,
    ) -> Self {
        Self {
            checkpoints,
            gateway,
            engine,
            escalation_hook: None,
            dedup: ResumeDedup::new(),
        }
    }

    pub fn with_escalation_hook(mut self, hook: Arc<dyn EscalationHook>) -> Self {
        self.escalation_hook = Some(hook);
        self
    }

    pub async fn create_checkpoint(
        &self,
        run_id: impl Into<String>,
        node_id: impl Into<String>,
        state_blob: serde_json::Value,
        required_inputs: serde_json::Value,
        blocking_reason: BlockingReason,
    ) -> Result<()> {
        let checkpoint =
            WorkflowCheckpoint::new(run_id, node_id, required_inputs, blocking_reason, state_blob);
        self.checkpoints.save(checkpoint).await
    }

    pub async fn send_request(
        &self,
        run_id: &str,
        recipient: &str,
        question: &str,
        required_inputs: &serde_json::Value,
    ) -> Result<()> {
        self.gateway
            .send_request(run_id, recipient, question, required_inputs)
            .await
    }

    /// Schema check only; does not touch the stored checkpoint.
    pub fn validate_resume_payload(
        required_inputs: &serde_json::Value,
        payload: &serde_json::Value,
    ) -> Result<()> {
        // A malformed schema can't block a resume forever; accept the payload.
        let Ok(compiled) = jsonschema::validator_for(required_inputs) else {
            return Ok(());
        };
        let errors: Vec<String> = compiled.iter_errors(payload).map(|e| e.to_string()).collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(MeridianError::ResumeValidation(errors.join("; ")))
        }
    }

    pub async fn resume_from_checkpoint(
        &self,
        run_id: &str,
        payload: serde_json::Value,
    ) -> Result<ResumeOutcome> {
        let checkpoint = self
            .checkpoints
            .latest(run_id)
            .await?
            .ok_or_else(|| MeridianError::Internal(anyhow::anyhow!("no checkpoint for run {run_id}")))?;

        Self::validate_resume_payload(&checkpoint.required_inputs, &payload)?;

        let merged = merge_state(&checkpoint.state_blob, &payload);
        self.engine
            .resume_at(run_id, &checkpoint.node_id, merged.clone(), payload)
            .await?;

        let mut resumed = checkpoint.clone();
        resumed.status = WorkflowStatus::Running;
        resumed.state_blob = merged;
        self.checkpoints.save(resumed).await?;

        Ok(ResumeOutcome::Applied {
            node_id: checkpoint.node_id,
        })
    }

    /// Normalizes an inbound reply: deduplicates, validates, and on success
    /// re-enters the engine. On a schema mismatch, sends a refined follow-up
    /// and leaves the checkpoint `waiting-external`.
    pub async fn ingest_resume_event(
        &self,
        run_id: &str,
        payload: serde_json::Value,
        sender_metadata: SenderMetadata,
    ) -> Result<ResumeOutcome> {
        let key = dedup_key(&payload, &sender_metadata);
        if let Some(cached) = self.dedup.check(run_id, &key) {
            return Ok(cached);
        }

        let checkpoint = self.checkpoints.latest(run_id).await?.ok_or_else(|| {
            MeridianError::Internal(anyhow::anyhow!("no checkpoint for run {run_id}"))
        })?;

        let outcome = match Self::validate_resume_payload(&checkpoint.required_inputs, &payload) {
            Ok(()) => {
                let merged = merge_state(&checkpoint.state_blob, &payload);
                self.engine
                    .resume_at(run_id, &checkpoint.node_id, merged.clone(), payload)
                    .await?;

                let mut resumed = checkpoint.clone();
                resumed.status = WorkflowStatus::Running;
                resumed.state_blob = merged;
                self.checkpoints.save(resumed).await?;

                ResumeOutcome::Applied {
                    node_id: checkpoint.node_id.clone(),
                }
            }
            Err(MeridianError::ResumeValidation(reason)) => {
                let recipient = sender_metadata.sender.as_deref().unwrap_or("unknown");
                let question = format!(
                    "Your reply didn't match what this step needs ({reason}). Please resend."
                );
                self.gateway
                    .send_request(run_id, recipient, &question, &checkpoint.required_inputs)
                    .await?;
                ResumeOutcome::SchemaMismatch { reason }
            }
            Err(other) => return Err(other),
        };

        self.dedup.record(run_id, key, outcome.clone());
        Ok(outcome)
    }

    /// Fires the escalation hook if `run_id`'s checkpoint has passed its
    /// deadline. The checkpoint remains resumable either way.
    pub async fn escalate_if_overdue(&self, run_id: &str) -> Result<bool> {
        let Some(checkpoint) = self.checkpoints.latest(run_id).await? else {
            return Ok(false);
        };
        let Some(deadline) = checkpoint.next_deadline else {
            return Ok(false);
        };
        if chrono::Utc::now() < deadline {
            return Ok(false);
        }
        if let Some(hook) = &self.escalation_hook {
            hook.escalate(&checkpoint).await?;
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint_store::InMemoryWorkflowCheckpointStore;
    use std::sync::Mutex;

    struct RecordingGateway {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl CommunicationGateway for RecordingGateway {
        async fn send_request(
            &self,
            _run_id: &str,
            recipient: &str,
            question: &str,
            _required_inputs: &serde_json::Value,
        ) -> Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((recipient.to_string(), question.to_string()));
            Ok(())
        }
    }

    struct RecordingEngine {
        resumed: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl WorkflowEngine for RecordingEngine {
        async fn resume_at(
            &self,
            run_id: &str,
            node_id: &str,
            _state_blob: serde_json::Value,
            _payload: serde_json::Value,
        ) -> Result<()> {
            self.resumed
                .lock()
                .unwrap()
                .push((run_id.to_string(), node_id.to_string()));
            Ok(())
        }
    }

    fn runtime() -> (ResumableWorkflowRuntime, Arc<RecordingGateway>, Arc<RecordingEngine>) {
        let checkpoints = Arc::new(InMemoryWorkflowCheckpointStore::new());
        let gateway = Arc::new(RecordingGateway {
            sent: Mutex::new(Vec::new()),
        });
        let engine = Arc::new(RecordingEngine {
            resumed: Mutex::new(Vec::new()),
        });
        let rt = ResumableWorkflowRuntime::new(checkpoints, gateway.clone(), engine.clone());
        (rt, gateway, engine)
    }

    #[tokio::test]
    async fn valid_resume_reenters_engine_once() {
        let (rt, _gateway, engine) = runtime();
        rt.create_checkpoint(
            "run-1",
            "node-a",
            serde_json::json!({"existing": true}),
            serde_json::json!({"type": "object", "required": ["approved"]}),
            BlockingReason::needs_decision(),
        )
        .await
        .unwrap();

        let meta = SenderMetadata {
            message_id: Some("msg-1".into()),
            sender: Some("user@example.com".into()),
        };
        let outcome = rt
            .ingest_resume_event("run-1", serde_json::json!({"approved": true}), meta.clone())
            .await
            .unwrap();
        assert!(matches!(outcome, ResumeOutcome::Applied { .. }));
        assert_eq!(engine.resumed.lock().unwrap().len(), 1);

        // Re-delivery of the same message id must not resume twice.
        let outcome2 = rt
            .ingest_resume_event("run-1", serde_json::json!({"approved": true}), meta)
            .await
            .unwrap();
        assert!(matches!(outcome2, ResumeOutcome::Duplicate));
        assert_eq!(engine.resumed.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn schema_mismatch_sends_refined_request_and_stays_waiting() {
        let (rt, gateway, engine) = runtime();
        rt.create_checkpoint(
            "run-2",
            "node-b",
            serde_json::json!({}),
            serde_json::json!({"type": "object", "required": ["approved"]}),
            BlockingReason::needs_decision(),
        )
        .await
        .unwrap();

        let meta = SenderMetadata {
            message_id: Some("msg-2".into()),
            sender: Some("user@example.com".into()),
        };
        let outcome = rt
            .ingest_resume_event("run-2", serde_json::json!({"unrelated": 1}), meta)
            .await
            .unwrap();
        assert!(matches!(outcome, ResumeOutcome::SchemaMismatch { .. }));
        assert_eq!(gateway.sent.lock().unwrap().len(), 1);
        assert!(engine.resumed.lock().unwrap().is_empty());
    }
}
