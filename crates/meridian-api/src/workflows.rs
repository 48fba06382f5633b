// `POST /workflows/wait`, `GET /workflows/{run_id}`, `POST
// /workflows/{run_id}/resume`, `POST /workflows/{run_id}/resume-and-continue`
// (spec.md §4.18, §6).
//
// The API carries no orchestration logic of its own, so the `WorkflowEngine`
// re-entry point here does the minimum a thin edge can do: publish a
// `StreamEvent` onto the paused run's session topic and let whichever agent
// loop is listening (or a human operator) pick the thread back up. Deeper
// in-process resumption would require wiring this trait into `AgentLoop`
// itself, which is out of scope for the HTTP layer.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use meridian_contracts::{BlockingReason, SessionId, StreamEvent, StreamEventPayload};
use meridian_core::error::Result as CoreResult;
use meridian_core::{EventSink, MessageBus};
use meridian_workflow::{CommunicationGateway, ResumeOutcome, WorkflowEngine};

use crate::common::ApiError;
use crate::state::AppState;

/// Dispatches wait-gate questions by emitting an `AwaitingInput` event onto
/// the run's session topic, reusing the same channel `ExecutorService` uses
/// for ordinary mission streaming.
pub struct BusCommunicationGateway {
    event_sink: Arc<dyn EventSink>,
}

impl BusCommunicationGateway {
    pub fn new(event_sink: Arc<dyn EventSink>) -> Self {
        Self { event_sink }
    }
}

#[async_trait]
impl CommunicationGateway for BusCommunicationGateway {
    async fn send_request(
        &self,
        run_id: &str,
        recipient: &str,
        question: &str,
        required_inputs: &serde_json::Value,
    ) -> CoreResult<()> {
        let event = StreamEvent::new(
            SessionId::from_string(run_id.to_string()),
            0,
            StreamEventPayload::AwaitingInput {
                question: format!("[to {recipient}] {question}"),
                required_inputs_schema: required_inputs.clone(),
                run_id: Some(run_id.to_string()),
            },
        );
        self.event_sink.emit(event).await
    }
}

/// Re-enters a paused run by announcing the resume on its session topic.
/// Whatever orchestration owns `run_id` (an `EpicOrchestrator` round, a
/// waiting `AgentLoop`) is expected to be subscribed and pick it up there.
pub struct BusWorkflowEngine {
    event_sink: Arc<dyn EventSink>,
}

impl BusWorkflowEngine {
    pub fn new(event_sink: Arc<dyn EventSink>) -> Self {
        Self { event_sink }
    }
}

#[async_trait]
impl WorkflowEngine for BusWorkflowEngine {
    async fn resume_at(
        &self,
        run_id: &str,
        node_id: &str,
        state_blob: serde_json::Value,
        payload: serde_json::Value,
    ) -> CoreResult<()> {
        let event = StreamEvent::new(
            SessionId::from_string(run_id.to_string()),
            0,
            StreamEventPayload::WorkflowResumed {
                node_id: node_id.to_string(),
                state_blob,
                payload,
            },
        );
        self.event_sink.emit(event).await
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct WaitRequest {
    pub run_id: String,
    pub node_id: String,
    pub state_blob: serde_json::Value,
    pub required_inputs: serde_json::Value,
    /// "decision" or "supplier-data" (spec.md §4.18 `BlockingReason`).
    pub reason: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WaitResponse {
    pub run_id: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ResumeRequest {
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ResumeAndContinueRequest {
    pub payload: serde_json::Value,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub sender: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ResumeResponse {
    pub outcome: String,
    pub node_id: Option<String>,
    pub reason: Option<String>,
}

impl From<ResumeOutcome> for ResumeResponse {
    fn from(outcome: ResumeOutcome) -> Self {
        match outcome {
            ResumeOutcome::Applied { node_id } => Self {
                outcome: "applied".to_string(),
                node_id: Some(node_id),
                reason: None,
            },
            ResumeOutcome::Duplicate => Self {
                outcome: "duplicate".to_string(),
                node_id: None,
                reason: None,
            },
            ResumeOutcome::SchemaMismatch { reason } => Self {
                outcome: "schema_mismatch".to_string(),
                node_id: None,
                reason: Some(reason),
            },
        }
    }
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/workflows/wait", post(create_wait))
        .route("/workflows/:run_id/resume", post(resume))
        .route("/workflows/:run_id/resume-and-continue", post(resume_and_continue))
        .route("/workflows/:run_id", get(latest_checkpoint))
        .with_state(state)
}

/// POST /workflows/wait - records a wait gate a caller has hit.
#[utoipa::path(
    post,
    path = "/workflows/wait",
    request_body = WaitRequest,
    responses((status = 200, description = "Checkpoint recorded", body = WaitResponse)),
    tag = "workflows"
)]
pub async fn create_wait(
    State(state): State<AppState>,
    Json(req): Json<WaitRequest>,
) -> Result<Json<WaitResponse>, ApiError> {
    let reason = if req.reason == "supplier-data" {
        BlockingReason::missing_supplier_data()
    } else {
        BlockingReason::needs_decision()
    };
    state
        .workflows
        .create_checkpoint(req.run_id.clone(), req.node_id, req.state_blob, req.required_inputs, reason)
        .await?;
    Ok(Json(WaitResponse { run_id: req.run_id }))
}

/// GET /workflows/{run_id} - the latest checkpoint for a run, if any.
#[utoipa::path(
    get,
    path = "/workflows/{run_id}",
    params(("run_id" = String, Path)),
    responses(
        (status = 200, description = "Latest checkpoint"),
        (status = 404, description = "No checkpoint for that run")
    ),
    tag = "workflows"
)]
pub async fn latest_checkpoint(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<meridian_contracts::WorkflowCheckpoint>, ApiError> {
    let checkpoint = state
        .checkpoints
        .latest(&run_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("no checkpoint for run {run_id}")))?;
    Ok(Json(checkpoint))
}

/// POST /workflows/{run_id}/resume - resumes unconditionally, no dedup. For
/// callers (e.g. an internal retry) that know they aren't redelivering.
#[utoipa::path(
    post,
    path = "/workflows/{run_id}/resume",
    params(("run_id" = String, Path)),
    request_body = ResumeRequest,
    responses((status = 200, description = "Resume outcome", body = ResumeResponse)),
    tag = "workflows"
)]
pub async fn resume(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    Json(req): Json<ResumeRequest>,
) -> Result<Json<ResumeResponse>, ApiError> {
    let outcome = state.workflows.resume_from_checkpoint(&run_id, req.payload).await?;
    Ok(Json(outcome.into()))
}

/// POST /workflows/{run_id}/resume-and-continue - resumes from an inbound
/// reply (chat, email, webhook). Deduplicates by `(message_id, sender,
/// payload)` and, on a schema mismatch, sends a refined follow-up rather
/// than failing the request.
#[utoipa::path(
    post,
    path = "/workflows/{run_id}/resume-and-continue",
    params(("run_id" = String, Path)),
    request_body = ResumeAndContinueRequest,
    responses((status = 200, description = "Resume outcome", body = ResumeResponse)),
    tag = "workflows"
)]
pub async fn resume_and_continue(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    Json(req): Json<ResumeAndContinueRequest>,
) -> Result<Json<ResumeResponse>, ApiError> {
    let sender_metadata = meridian_workflow::SenderMetadata {
        message_id: req.message_id,
        sender: req.sender,
    };
    let outcome = state
        .workflows
        .ingest_resume_event(&run_id, req.payload, sender_metadata)
        .await?;
    Ok(Json(outcome.into()))
}
