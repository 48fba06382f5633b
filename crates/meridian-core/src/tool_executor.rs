// Tool dispatch (spec.md §4.5).
//
// Mirrors the teacher's `ToolExecutionResult` contract: a tool-level error is
// safe to show the model, an internal error is logged and replaced with a
// generic message before it reaches the model.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde_json::Value;
use tracing::{error, warn};

use meridian_contracts::{
    IdentityContext, SessionId, ToolCallRequest, ToolErrorKind, ToolResult,
};

use crate::approval::{ApprovalDecision, ApprovalPolicy, AutoApprove};
use crate::tool_registry::ToolRegistry;
use crate::traits::ToolResultStore;

const DEFAULT_LARGE_OUTPUT_THRESHOLD: usize = 5_000;
const DEFAULT_PREVIEW_CHARS: usize = 500;

/// The outcome of executing one tool call, before translation into the
/// model-facing `ToolResult`.
#[derive(Debug)]
pub enum ToolExecutionResult {
    /// Successful execution with a JSON result.
    Success(Value),
    /// Tool-level error, safe to show to the model (validation failures,
    /// "not found", ...).
    ToolError(String),
    /// System-level error. Logged in full; the model sees only a generic
    /// message.
    InternalError(ToolInternalError),
}

impl ToolExecutionResult {
    pub fn success(value: Value) -> Self {
        ToolExecutionResult::Success(value)
    }

    pub fn tool_error(message: impl Into<String>) -> Self {
        ToolExecutionResult::ToolError(message.into())
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        ToolExecutionResult::InternalError(ToolInternalError::from_message(message))
    }
}

#[derive(Debug)]
pub struct ToolInternalError {
    pub message: String,
}

impl ToolInternalError {
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Executes the tool calls produced by one assistant turn, per spec.md §4.5's
/// numbered steps: resolve, validate, approve, inject parent session, dispatch
/// (parallel where declared), time out, and offload large outputs to the
/// tool-result store.
pub struct ToolExecutor {
    pub registry: Arc<ToolRegistry>,
    pub result_store: Arc<dyn ToolResultStore>,
    pub approval_policy: Arc<dyn ApprovalPolicy>,
    pub large_output_threshold: usize,
    pub preview_chars: usize,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>, result_store: Arc<dyn ToolResultStore>) -> Self {
        Self {
            registry,
            result_store,
            approval_policy: Arc::new(AutoApprove),
            large_output_threshold: DEFAULT_LARGE_OUTPUT_THRESHOLD,
            preview_chars: DEFAULT_PREVIEW_CHARS,
        }
    }

    pub fn with_approval_policy(mut self, policy: Arc<dyn ApprovalPolicy>) -> Self {
        self.approval_policy = policy;
        self
    }

    /// Dispatch `requests` and return one `ToolResult` per request, in the
    /// original request order, regardless of which ones ran concurrently.
    pub async fn execute_batch(
        &self,
        requests: Vec<ToolCallRequest>,
        session_id: &SessionId,
        identity: &IdentityContext,
    ) -> Vec<ToolResult> {
        let mut parallel_indices = Vec::new();
        let mut serial_indices = Vec::new();
        let mut seen_serial_tools = HashSet::new();

        for (i, req) in requests.iter().enumerate() {
            let parallel_safe = self
                .registry
                .get(&req.name)
                .map(|t| t.definition().supports_parallelism)
                .unwrap_or(false);
            // Two calls to the same non-parallel-safe tool must still be
            // serialized relative to each other (spec.md §4.5 tie-break).
            if parallel_safe && !seen_serial_tools.contains(&req.name) {
                parallel_indices.push(i);
            } else {
                seen_serial_tools.insert(req.name.clone());
                serial_indices.push(i);
            }
        }

        let mut results: Vec<Option<ToolResult>> = (0..requests.len()).map(|_| None).collect();

        let parallel_futures = parallel_indices.iter().map(|&i| {
            self.dispatch_one(&requests[i], session_id, identity)
        });
        for (i, result) in parallel_indices
            .iter()
            .zip(join_all(parallel_futures).await)
        {
            results[*i] = Some(result);
        }

        for i in serial_indices {
            let result = self.dispatch_one(&requests[i], session_id, identity).await;
            results[i] = Some(result);
        }

        results.into_iter().map(|r| r.expect("every index filled")).collect()
    }

    async fn dispatch_one(
        &self,
        request: &ToolCallRequest,
        session_id: &SessionId,
        identity: &IdentityContext,
    ) -> ToolResult {
        // Step 1: resolve.
        let Some(tool) = self.registry.get(&request.name) else {
            return ToolResult::failure(
                request.id.clone(),
                format!("unknown tool: {}", request.name),
                ToolErrorKind::UnknownTool,
            );
        };
        let definition = tool.definition();

        // Step 2: validate parameters against the declared schema.
        if let Err(reason) = validate_params(&definition.parameters_schema, &request.params) {
            return ToolResult::failure(request.id.clone(), reason, ToolErrorKind::ParamValidation);
        }

        // Step 3: approval.
        if definition.requires_approval {
            match self.approval_policy.decide(request, identity).await {
                ApprovalDecision::Approved => {}
                ApprovalDecision::Denied { reason } => {
                    return ToolResult::failure(request.id.clone(), reason, ToolErrorKind::NotApproved);
                }
            }
        }

        // Step 4: inject parent session id for sub-agent calls.
        let mut params = request.params.clone();
        if request.name == "call_agent" {
            if let Value::Object(ref mut map) = params {
                map.insert(
                    "_parent_session_id".to_string(),
                    Value::String(session_id.to_string()),
                );
            }
        }

        // Steps 5 and 6: dispatch with a per-tool timeout.
        let timeout = Duration::from_secs(definition.timeout_secs);
        let execution = tool.execute(params, session_id, identity);
        let outcome = match tokio::time::timeout(timeout, execution).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(tool = %request.name, tool_call_id = %request.id, "tool dispatch timed out");
                return ToolResult::failure(
                    request.id.clone(),
                    format!("tool {} timed out after {}s", request.name, definition.timeout_secs),
                    ToolErrorKind::ToolTimeout,
                );
            }
        };

        let mut result = match outcome {
            ToolExecutionResult::Success(value) => ToolResult::success(request.id.clone(), value),
            ToolExecutionResult::ToolError(message) => {
                ToolResult::failure(request.id.clone(), message, ToolErrorKind::ToolFailure)
            }
            ToolExecutionResult::InternalError(err) => {
                error!(
                    tool = %request.name,
                    tool_call_id = %request.id,
                    error = %err.message,
                    "tool internal error (details hidden from model)"
                );
                ToolResult::failure(
                    request.id.clone(),
                    "an internal error occurred while executing the tool",
                    ToolErrorKind::ToolFailure,
                )
            }
        };

        // Step 7: offload large output to the tool-result store.
        if let Some(output) = &result.output {
            let serialized = serde_json::to_string(output).unwrap_or_default();
            if serialized.len() > self.large_output_threshold {
                match self.result_store.put(session_id, output).await {
                    Ok(handle) => {
                        let preview: String = serialized.chars().take(self.preview_chars).collect();
                        result = result.with_handle(handle, preview, serialized.len());
                    }
                    Err(e) => {
                        error!(error = %e, "failed to store large tool output");
                    }
                }
            }
        }

        result
    }
}

/// Best-effort JSON Schema validation: required-field presence and, when
/// declared, scalar type checks. Malformed schemas never block dispatch.
fn validate_params(schema: &Value, params: &Value) -> Result<(), String> {
    let Ok(compiled) = jsonschema::validator_for(schema) else {
        return Ok(());
    };
    let errors: Vec<String> = compiled
        .iter_errors(params)
        .map(|e| e.to_string())
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("; "))
    }
}
