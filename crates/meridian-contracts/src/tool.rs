// Tool call / tool result types (spec.md §3, §4.5, §4.15).

use serde::{Deserialize, Serialize};

/// A tool-call request produced by one assistant turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ToolCallRequest {
    /// Unique within the assistant turn that produced it.
    pub id: String,
    pub name: String,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub params: serde_json::Value,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            params,
        }
    }
}

/// Declared metadata for a tool, as seen by the registry and the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's parameters.
    pub parameters_schema: serde_json::Value,
    #[serde(default)]
    pub supports_parallelism: bool,
    #[serde(default)]
    pub idempotent: bool,
    #[serde(default)]
    pub requires_approval: bool,
    /// Dispatch timeout in seconds; defaults to 60 (spec.md §4.5 step 6).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    60
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters_schema: serde_json::json!({"type": "object", "properties": {}}),
            supports_parallelism: false,
            idempotent: false,
            requires_approval: false,
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn parallel(mut self) -> Self {
        self.supports_parallelism = true;
        self
    }

    pub fn idempotent(mut self) -> Self {
        self.idempotent = true;
        self
    }

    pub fn requires_approval(mut self) -> Self {
        self.requires_approval = true;
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.parameters_schema = schema;
        self
    }
}

/// A typed error kind attached to a failed `ToolResult` (spec.md §7 tool-level kinds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    UnknownTool,
    ParamValidation,
    NotApproved,
    ToolTimeout,
    ToolFailure,
    PartialRecovery,
}

/// The outcome of dispatching one `ToolCallRequest` (spec.md §3 `ToolResult`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub success: bool,
    pub output: Option<serde_json::Value>,
    pub error: Option<String>,
    pub error_kind: Option<ToolErrorKind>,
    /// Set when the serialized output exceeded the large-output threshold and
    /// was moved to the tool-result store (spec.md §4.2).
    pub handle: Option<String>,
    /// Truncated preview shown in the message history when `handle` is set.
    pub preview: Option<String>,
    /// Byte length of the full (un-truncated) serialized output.
    pub size: Option<usize>,
}

impl ToolResult {
    pub fn success(tool_call_id: impl Into<String>, output: serde_json::Value) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            success: true,
            output: Some(output),
            error: None,
            error_kind: None,
            handle: None,
            preview: None,
            size: None,
        }
    }

    pub fn failure(
        tool_call_id: impl Into<String>,
        error: impl Into<String>,
        kind: ToolErrorKind,
    ) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            success: false,
            output: None,
            error: Some(error.into()),
            error_kind: Some(kind),
            handle: None,
            preview: None,
            size: None,
        }
    }

    pub fn with_handle(mut self, handle: impl Into<String>, preview: impl Into<String>, size: usize) -> Self {
        self.handle = Some(handle.into());
        self.preview = Some(preview.into());
        self.size = Some(size);
        self
    }
}
