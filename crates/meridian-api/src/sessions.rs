// `GET /sessions`, `GET /sessions/{id}`, `DELETE /sessions/{id}` (spec.md §6).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get};
use axum::{Json, Router};

use meridian_contracts::{Session, SessionId};

use crate::common::{ApiError, ListResponse};
use crate::state::AppState;

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/sessions", get(list_sessions))
        .route("/sessions/:session_id", get(get_session).delete(delete_session))
        .with_state(state)
}

/// GET /sessions - list all known sessions.
#[utoipa::path(
    get,
    path = "/sessions",
    responses((status = 200, description = "All sessions", body = [Session])),
    tag = "sessions"
)]
pub async fn list_sessions(State(state): State<AppState>) -> Result<Json<ListResponse<Session>>, ApiError> {
    let sessions = state.sessions.list().await?;
    Ok(Json(sessions.into()))
}

/// GET /sessions/{session_id}
#[utoipa::path(
    get,
    path = "/sessions/{session_id}",
    params(("session_id" = String, Path)),
    responses(
        (status = 200, description = "The session", body = Session),
        (status = 404, description = "No session with that id")
    ),
    tag = "sessions"
)]
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Session>, ApiError> {
    let session_id = SessionId::from_string(session_id);
    let session = state
        .sessions
        .get(&session_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("no session {session_id:?}")))?;
    Ok(Json(session))
}

/// DELETE /sessions/{session_id}
#[utoipa::path(
    delete,
    path = "/sessions/{session_id}",
    params(("session_id" = String, Path)),
    responses((status = 204, description = "Session deleted")),
    tag = "sessions"
)]
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let session_id = SessionId::from_string(session_id);
    state.sessions.delete(&session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
