// Anthropic Messages API `LlmProvider`. Requests stream (`stream: true`);
// the SSE content-block deltas are accumulated into a single `LlmResponse`,
// mirroring meridian-openai's collect-from-stream shape for this simpler,
// non-streaming trait seam.

use std::collections::HashMap;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::Client;

use meridian_contracts::{MeridianError, TokenUsage, ToolCallRequest, ToolDefinition};
use meridian_core::error::Result;
use meridian_core::traits::{LlmCallConfig, LlmMessage, LlmMessageRole, LlmProvider, LlmResponse};

use crate::types::{
    AnthropicContentBlock, AnthropicMessage, AnthropicRequest, AnthropicStreamBlockStart,
    AnthropicStreamDelta, AnthropicStreamEvent, AnthropicTool,
};

const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

#[derive(Clone)]
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    api_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_url: DEFAULT_API_URL.to_string(),
        }
    }

    /// Reads `ANTHROPIC_API_KEY` from the environment.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| MeridianError::Internal(anyhow::anyhow!("ANTHROPIC_API_KEY not set")))?;
        Ok(Self::new(api_key))
    }

    pub fn with_base_url(api_key: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_url: api_url.into(),
        }
    }

    /// Anthropic pulls the system prompt out of the message list entirely;
    /// every `System` message is joined into one string and the rest
    /// converted to user/assistant turns (tool results become user turns
    /// carrying a `tool_result` block, matching the Messages API shape).
    fn split_system_and_messages(messages: &[LlmMessage]) -> (Option<String>, Vec<AnthropicMessage>) {
        let mut system_parts = Vec::new();
        let mut converted = Vec::new();

        for msg in messages {
            match msg.role {
                LlmMessageRole::System => system_parts.push(msg.content.clone()),
                LlmMessageRole::User => converted.push(AnthropicMessage {
                    role: "user".to_string(),
                    content: vec![AnthropicContentBlock::Text {
                        text: msg.content.clone(),
                    }],
                }),
                LlmMessageRole::Assistant => {
                    let mut blocks = Vec::new();
                    if !msg.content.is_empty() {
                        blocks.push(AnthropicContentBlock::Text {
                            text: msg.content.clone(),
                        });
                    }
                    for tc in msg.tool_calls.iter().flatten() {
                        blocks.push(AnthropicContentBlock::ToolUse {
                            id: tc.id.clone(),
                            name: tc.name.clone(),
                            input: tc.params.clone(),
                        });
                    }
                    converted.push(AnthropicMessage {
                        role: "assistant".to_string(),
                        content: blocks,
                    });
                }
                LlmMessageRole::Tool => {
                    let tool_use_id = msg.tool_call_id.clone().unwrap_or_default();
                    converted.push(AnthropicMessage {
                        role: "user".to_string(),
                        content: vec![AnthropicContentBlock::ToolResult {
                            tool_use_id,
                            content: msg.content.clone(),
                        }],
                    });
                }
            }
        }

        let system = (!system_parts.is_empty()).then(|| system_parts.join("\n\n"));
        (system, converted)
    }

    fn convert_tools(tools: &[ToolDefinition]) -> Vec<AnthropicTool> {
        tools
            .iter()
            .map(|tool| AnthropicTool {
                name: tool.name.clone(),
                description: tool.description.clone(),
                input_schema: tool.parameters_schema.clone(),
            })
            .collect()
    }
}

#[derive(Default)]
struct PendingToolUse {
    id: String,
    name: String,
    json_buffer: String,
}

#[derive(Default)]
struct Accumulator {
    text: String,
    tool_uses: HashMap<usize, PendingToolUse>,
    order: Vec<usize>,
    usage: TokenUsage,
    stop_reason: Option<String>,
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn chat_completion(
        &self,
        messages: Vec<LlmMessage>,
        config: &LlmCallConfig,
    ) -> Result<LlmResponse> {
        let (system, anthropic_messages) = Self::split_system_and_messages(&messages);

        let request = AnthropicRequest {
            model: config.model.clone(),
            max_tokens: config.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system,
            messages: anthropic_messages,
            temperature: config.temperature,
            tools: (!config.tools.is_empty()).then(|| Self::convert_tools(&config.tools)),
            stream: true,
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| MeridianError::Internal(anyhow::anyhow!("anthropic request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MeridianError::Internal(anyhow::anyhow!(
                "anthropic api error ({status}): {body}"
            )));
        }

        let mut events = response.bytes_stream().eventsource();
        let mut acc = Accumulator::default();

        while let Some(event) = events.next().await {
            let event = event.map_err(|e| {
                MeridianError::Internal(anyhow::anyhow!("anthropic stream error: {e}"))
            })?;
            let Ok(parsed) = serde_json::from_str::<AnthropicStreamEvent>(&event.data) else {
                continue;
            };
            match parsed {
                AnthropicStreamEvent::MessageStart { message } => {
                    if let Some(usage) = message.usage {
                        acc.usage.prompt_tokens = usage.input_tokens;
                    }
                }
                AnthropicStreamEvent::ContentBlockStart {
                    index,
                    content_block: AnthropicStreamBlockStart::ToolUse { id, name },
                } => {
                    acc.order.push(index);
                    acc.tool_uses.insert(
                        index,
                        PendingToolUse {
                            id,
                            name,
                            json_buffer: String::new(),
                        },
                    );
                }
                AnthropicStreamEvent::ContentBlockDelta { index, delta } => match delta {
                    AnthropicStreamDelta::TextDelta { text } => acc.text.push_str(&text),
                    AnthropicStreamDelta::InputJsonDelta { partial_json } => {
                        if let Some(pending) = acc.tool_uses.get_mut(&index) {
                            pending.json_buffer.push_str(&partial_json);
                        }
                    }
                    AnthropicStreamDelta::Unknown => {}
                },
                AnthropicStreamEvent::MessageDelta { delta, usage } => {
                    acc.stop_reason = delta.stop_reason;
                    if let Some(usage) = usage {
                        acc.usage.completion_tokens = usage.output_tokens;
                    }
                }
                AnthropicStreamEvent::MessageStop => break,
                _ => {}
            }
        }

        acc.usage.total_tokens = acc.usage.prompt_tokens + acc.usage.completion_tokens;

        let tool_calls = acc
            .order
            .into_iter()
            .filter_map(|index| acc.tool_uses.remove(&index))
            .map(|pending| {
                let params = serde_json::from_str(&pending.json_buffer)
                    .unwrap_or_else(|_| serde_json::json!({}));
                ToolCallRequest::new(pending.id, pending.name, params)
            })
            .collect();

        Ok(LlmResponse {
            text: acc.text,
            tool_calls,
            token_usage: acc.usage,
            finish_reason: acc.stop_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_messages_are_pulled_out_and_joined() {
        let messages = vec![
            LlmMessage {
                role: LlmMessageRole::System,
                content: "Be terse.".to_string(),
                tool_calls: None,
                tool_call_id: None,
            },
            LlmMessage {
                role: LlmMessageRole::User,
                content: "hello".to_string(),
                tool_calls: None,
                tool_call_id: None,
            },
        ];
        let (system, converted) = AnthropicProvider::split_system_and_messages(&messages);
        assert_eq!(system.as_deref(), Some("Be terse."));
        assert_eq!(converted.len(), 1);
        assert_eq!(converted[0].role, "user");
    }

    #[test]
    fn tool_result_message_becomes_user_turn_with_tool_result_block() {
        let messages = vec![LlmMessage {
            role: LlmMessageRole::Tool,
            content: "42".to_string(),
            tool_calls: None,
            tool_call_id: Some("toolu_1".to_string()),
        }];
        let (_, converted) = AnthropicProvider::split_system_and_messages(&messages);
        assert_eq!(converted.len(), 1);
        assert_eq!(converted[0].role, "user");
        match &converted[0].content[0] {
            AnthropicContentBlock::ToolResult { tool_use_id, content } => {
                assert_eq!(tool_use_id, "toolu_1");
                assert_eq!(content, "42");
            }
            _ => panic!("expected a tool_result block"),
        }
    }
}
