// `POST /execute` and `POST /execute/stream` (spec.md §6).

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::routing::post;
use axum::{Json, Router};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;

use meridian_contracts::{ExecutionResult, IdentityContext, Mission, SessionId};
use meridian_core::BusSubscription;
use meridian_service::{ExecutionMode, ExecutionProfile};

use crate::common::ApiError;
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ExecuteRequest {
    /// The mission text (spec.md §3 `Mission`).
    pub mission: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Suggested epic worker count (spec.md §3 `Mission.preferred_worker_count`).
    #[serde(default)]
    pub preferred_worker_count: Option<usize>,
    /// Overrides the `RuntimeProfile` default agent id.
    #[serde(default)]
    pub agent_id: Option<String>,
    /// Resumes an existing session instead of starting a new root session.
    #[serde(default)]
    pub session_id: Option<String>,
    /// CLI `--auto-epic` / `--no-auto-epic` equivalent; `None` defers to the
    /// runtime default.
    #[serde(default)]
    pub auto_epic: Option<bool>,
    /// CLI `epic run` / forced-simple equivalent: `"epic"` or `"simple"`
    /// bypasses the classifier entirely. Takes precedence over `auto_epic`.
    #[serde(default)]
    pub force_mode: Option<String>,
    #[serde(default)]
    pub principal: Option<String>,
}

impl ExecuteRequest {
    fn mission(&self) -> Mission {
        let mut mission = Mission::new(self.mission.clone());
        mission.scopes = self.scopes.clone();
        mission.preferred_worker_count = self.preferred_worker_count;
        mission
    }

    fn identity(&self) -> IdentityContext {
        match &self.principal {
            Some(p) => IdentityContext::with_principal(p.clone()),
            None => IdentityContext::anonymous(),
        }
    }

    fn profile(&self, state: &AppState) -> ExecutionProfile {
        let agent_id = self
            .agent_id
            .clone()
            .unwrap_or_else(|| state.runtime.default_agent_id.clone());
        let mut profile = ExecutionProfile::from_runtime(agent_id, &state.runtime);
        match self.force_mode.as_deref() {
            Some("epic") => return profile.with_forced_mode(ExecutionMode::Epic),
            Some("simple") => return profile.with_forced_mode(ExecutionMode::Simple),
            _ => {}
        }
        match self.auto_epic {
            Some(false) => profile = profile.with_forced_mode(ExecutionMode::Simple),
            Some(true) => profile.auto_epic = true,
            None => {}
        }
        profile
    }
}

enum RunState {
    Active {
        subscription: Box<dyn BusSubscription>,
        cancel: CancellationToken,
        handle: tokio::task::JoinHandle<meridian_core::error::Result<ExecutionResult>>,
    },
    Finished,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/execute", post(execute))
        .route("/execute/stream", post(execute_stream))
        .with_state(state)
}

/// POST /execute - run a mission synchronously to completion.
#[utoipa::path(
    post,
    path = "/execute",
    request_body = ExecuteRequest,
    responses(
        (status = 200, description = "Mission completed", body = ExecutionResult),
        (status = 500, description = "Internal server error")
    ),
    tag = "execute"
)]
pub async fn execute(
    State(state): State<AppState>,
    Json(req): Json<ExecuteRequest>,
) -> Result<Json<ExecutionResult>, ApiError> {
    let profile = req.profile(&state);
    let session_id = req.session_id.clone().map(SessionId::from_string);
    let result = state
        .executor
        .execute_mission(req.mission(), &profile, session_id, &req.identity(), CancellationToken::new())
        .await?;
    Ok(Json(result))
}

/// POST /execute/stream - run a mission, streaming ordered `StreamEvent`s as
/// server-sent events until the run completes (spec.md §4.16 ordering
/// guarantee: strictly ordered within this session, interleaved across others).
#[utoipa::path(
    post,
    path = "/execute/stream",
    request_body = ExecuteRequest,
    responses(
        (status = 200, description = "Event stream", content_type = "text/event-stream"),
        (status = 500, description = "Internal server error")
    ),
    tag = "execute"
)]
pub async fn execute_stream(
    State(state): State<AppState>,
    Json(req): Json<ExecuteRequest>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    let profile = req.profile(&state);
    let session_id = req.session_id.clone().map(SessionId::from_string);
    let identity = req.identity();

    let streaming = state
        .executor
        .execute_mission_streaming(req.mission(), profile, session_id, identity)
        .await?;

    let state = RunState::Active {
        subscription: streaming.subscription,
        cancel: streaming.cancel,
        handle: streaming.handle,
    };

    // Replays `StreamEvent`s off the session topic as they arrive, then
    // emits one final `execution-result` event once the background task
    // driving the mission completes.
    let stream = stream::unfold(state, move |state| async move {
        match state {
            RunState::Active { mut subscription, cancel, handle } => match subscription.recv(&cancel).await {
                Some(message) => {
                    let json = serde_json::to_string(&message.payload).unwrap_or_else(|_| "{}".to_string());
                    let event = Ok(SseEvent::default().event("stream-event").data(json));
                    Some((event, RunState::Active { subscription, cancel, handle }))
                }
                None => {
                    let json = match handle.await {
                        Ok(Ok(result)) => serde_json::to_string(&result).unwrap_or_else(|_| "{}".to_string()),
                        _ => "{}".to_string(),
                    };
                    let event = Ok(SseEvent::default().event("execution-result").data(json));
                    Some((event, RunState::Finished))
                }
            },
            RunState::Finished => None,
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default().interval(Duration::from_secs(15))))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ExecuteStreamHandle {
    pub session_id: String,
}
