// Shared HTTP DTOs and error mapping (spec.md §7 "HTTP 4xx for client
// errors..., 5xx for internal").

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use meridian_contracts::MeridianError;

/// Response wrapper for list endpoints; all list endpoints return their
/// array wrapped in a `data` field.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(data: Vec<T>) -> Self {
        Self { data }
    }
}

/// A structured error body: `{kind, message}`, matching the `error`
/// `StreamEvent` payload shape (spec.md §6) so clients handle both the same way.
pub struct ApiError {
    status: StatusCode,
    kind: String,
    message: String,
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            kind: "NotFound".to_string(),
            message: message.into(),
        }
    }
}

/// Maps the error taxonomy of spec.md §7 onto HTTP status codes: validation
/// and conflict kinds are 4xx, everything else is 5xx.
impl From<MeridianError> for ApiError {
    fn from(err: MeridianError) -> Self {
        let status = match &err {
            MeridianError::ParamValidation { .. } | MeridianError::ResumeValidation(_) => StatusCode::BAD_REQUEST,
            MeridianError::NotApproved(_) => StatusCode::FORBIDDEN,
            MeridianError::VersionConflict { .. } | MeridianError::PersistenceConflict(_) => StatusCode::CONFLICT,
            MeridianError::UnknownTool(_) | MeridianError::HandleNotFound(_) => StatusCode::NOT_FOUND,
            MeridianError::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(kind = %self.kind, message = %self.message, "request failed");
        } else {
            tracing::warn!(kind = %self.kind, message = %self.message, "request rejected");
        }
        (self.status, Json(json!({"kind": self.kind, "message": self.message}))).into_response()
    }
}
