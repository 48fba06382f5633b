// Message types (spec.md §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tool::{ToolCallRequest, ToolResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::Tool => write!(f, "tool"),
        }
    }
}

/// A content part; assistant messages may carry both text and tool calls,
/// matching spec.md §4.8's "content with attached tool calls" tie-break.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ContentPart {
    Text(String),
    /// Preview + handle substitution for a large tool result (spec.md §4.2, §4.3).
    HandleRef {
        preview: String,
        handle: String,
        size: usize,
    },
}

impl ContentPart {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentPart::Text(s) => Some(s),
            ContentPart::HandleRef { .. } => None,
        }
    }
}

/// The content carried by one message.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MessageContent {
    pub parts: Vec<ContentPart>,
}

impl MessageContent {
    pub fn text(s: impl Into<String>) -> Self {
        Self {
            parts: vec![ContentPart::Text(s.into())],
        }
    }

    pub fn empty() -> Self {
        Self { parts: Vec::new() }
    }

    /// Flattened text view used for character-cap sanitization and LLM calls.
    pub fn as_plain_text(&self) -> String {
        self.parts
            .iter()
            .map(|p| match p {
                ContentPart::Text(s) => s.clone(),
                ContentPart::HandleRef {
                    preview,
                    handle,
                    size,
                } => format!("{preview}\n[truncated, {size} bytes total, handle={handle}]"),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn char_len(&self) -> usize {
        self.as_plain_text().chars().count()
    }
}

/// An ordered entry in a session's message history (spec.md §3 `Message`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: MessageRole,
    pub content: MessageContent,
    /// Tool calls requested by this message (assistant messages only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRequest>>,
    /// Set on tool-role messages to correlate with the originating request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, MessageContent::text(content))
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, MessageContent::text(content))
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, MessageContent::text(content))
    }

    pub fn assistant_with_tool_calls(
        content: impl Into<String>,
        tool_calls: Vec<ToolCallRequest>,
    ) -> Self {
        let mut msg = Self::new(MessageRole::Assistant, MessageContent::text(content));
        msg.tool_calls = Some(tool_calls);
        msg
    }

    pub fn tool_result(tool_call_id: impl Into<String>, result: &ToolResult) -> Self {
        let content = if let (Some(preview), Some(handle), Some(size)) =
            (&result.preview, &result.handle, result.size)
        {
            MessageContent {
                parts: vec![ContentPart::HandleRef {
                    preview: preview.clone(),
                    handle: handle.clone(),
                    size,
                }],
            }
        } else if let Some(err) = &result.error {
            MessageContent::text(format!("error: {err}"))
        } else {
            MessageContent::text(
                result
                    .output
                    .as_ref()
                    .map(|v| serde_json::to_string(v).unwrap_or_default())
                    .unwrap_or_default(),
            )
        };

        Self {
            id: Uuid::now_v7(),
            role: MessageRole::Tool,
            content,
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
            created_at: Utc::now(),
        }
    }

    fn new(role: MessageRole, content: MessageContent) -> Self {
        Self {
            id: Uuid::now_v7(),
            role,
            content,
            tool_calls: None,
            tool_call_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|tc| !tc.is_empty())
    }

    pub fn text(&self) -> String {
        self.content.as_plain_text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_result_message_prefers_handle_over_raw_output() {
        let result = ToolResult::success("call_1", serde_json::json!({"x": 1}))
            .with_handle("h1", "preview...", 200_000);
        let msg = Message::tool_result("call_1", &result);
        assert!(msg.text().contains("h1"));
    }

    #[test]
    fn assistant_message_with_tool_calls_is_not_a_final_answer() {
        let msg = Message::assistant_with_tool_calls(
            "",
            vec![ToolCallRequest::new("c1", "shell", serde_json::json!({}))],
        );
        assert!(msg.has_tool_calls());
    }
}
