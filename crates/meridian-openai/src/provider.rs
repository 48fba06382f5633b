// OpenAI chat-completions `LlmProvider`. Requests are made with `stream:
// true` and the SSE deltas are accumulated into a single `LlmResponse` --
// the provider seam in meridian-core is a collected call, not a stream, but
// accumulating from SSE keeps this aligned with how the reference provider
// in the example pack talks to the same API.

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::Client;
use serde_json::json;

use meridian_contracts::{MeridianError, TokenUsage, ToolCallRequest, ToolDefinition};
use meridian_core::error::Result;
use meridian_core::traits::{LlmCallConfig, LlmMessage, LlmMessageRole, LlmProvider, LlmResponse};

use crate::types::{
    OpenAiDelta, OpenAiFunction, OpenAiFunctionCall, OpenAiMessage, OpenAiRequest,
    OpenAiStreamChunk, OpenAiTool, OpenAiToolCall,
};

const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Clone)]
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    api_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_url: DEFAULT_API_URL.to_string(),
        }
    }

    /// Reads `OPENAI_API_KEY` from the environment.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| MeridianError::Internal(anyhow::anyhow!("OPENAI_API_KEY not set")))?;
        Ok(Self::new(api_key))
    }

    /// Points at an OpenAI-compatible endpoint other than the public API
    /// (local proxies, Azure OpenAI, self-hosted gateways).
    pub fn with_base_url(api_key: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_url: api_url.into(),
        }
    }

    fn convert_role(role: LlmMessageRole) -> &'static str {
        match role {
            LlmMessageRole::System => "system",
            LlmMessageRole::User => "user",
            LlmMessageRole::Assistant => "assistant",
            LlmMessageRole::Tool => "tool",
        }
    }

    fn convert_message(msg: &LlmMessage) -> OpenAiMessage {
        OpenAiMessage {
            role: Self::convert_role(msg.role).to_string(),
            content: Some(msg.content.clone()),
            tool_calls: msg.tool_calls.as_ref().map(|calls| {
                calls
                    .iter()
                    .map(|tc| OpenAiToolCall {
                        id: tc.id.clone(),
                        r#type: "function".to_string(),
                        function: OpenAiFunctionCall {
                            name: tc.name.clone(),
                            arguments: serde_json::to_string(&tc.params).unwrap_or_default(),
                        },
                    })
                    .collect()
            }),
            tool_call_id: msg.tool_call_id.clone(),
        }
    }

    fn convert_tools(tools: &[ToolDefinition]) -> Vec<OpenAiTool> {
        tools
            .iter()
            .map(|tool| OpenAiTool {
                r#type: "function".to_string(),
                function: OpenAiFunction {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters: tool.parameters_schema.clone(),
                },
            })
            .collect()
    }
}

#[derive(Default)]
struct Accumulator {
    text: String,
    tool_calls: Vec<ToolCallRequest>,
    usage: TokenUsage,
    finish_reason: Option<String>,
}

fn apply_tool_call_delta(acc: &mut Vec<ToolCallRequest>, delta: &OpenAiDelta) {
    let Some(tool_calls) = &delta.tool_calls else { return };
    for tc in tool_calls {
        let idx = tc.index as usize;
        while acc.len() <= idx {
            acc.push(ToolCallRequest::new(String::new(), String::new(), json!("")));
        }
        if let Some(id) = &tc.id {
            acc[idx].id = id.clone();
        }
        if let Some(function) = &tc.function {
            if let Some(name) = &function.name {
                acc[idx].name = name.clone();
            }
            if let Some(args) = &function.arguments {
                let current = acc[idx].params.as_str().unwrap_or("");
                acc[idx].params = json!(format!("{current}{args}"));
            }
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn chat_completion(
        &self,
        messages: Vec<LlmMessage>,
        config: &LlmCallConfig,
    ) -> Result<LlmResponse> {
        let request = OpenAiRequest {
            model: config.model.clone(),
            messages: messages.iter().map(Self::convert_message).collect(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            stream: true,
            tools: (!config.tools.is_empty()).then(|| Self::convert_tools(&config.tools)),
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| MeridianError::Internal(anyhow::anyhow!("openai request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MeridianError::Internal(anyhow::anyhow!(
                "openai api error ({status}): {body}"
            )));
        }

        let mut events = response.bytes_stream().eventsource();
        let mut acc = Accumulator::default();

        while let Some(event) = events.next().await {
            let event = event
                .map_err(|e| MeridianError::Internal(anyhow::anyhow!("openai stream error: {e}")))?;
            if event.data == "[DONE]" {
                break;
            }
            let chunk: OpenAiStreamChunk = match serde_json::from_str(&event.data) {
                Ok(chunk) => chunk,
                Err(_) => continue,
            };
            let Some(choice) = chunk.choices.first() else { continue };
            if let Some(content) = &choice.delta.content {
                acc.text.push_str(content);
            }
            apply_tool_call_delta(&mut acc.tool_calls, &choice.delta);
            if let Some(usage) = &chunk.usage {
                acc.usage = TokenUsage {
                    prompt_tokens: usage.prompt_tokens,
                    completion_tokens: usage.completion_tokens,
                    total_tokens: usage.total_tokens,
                };
            }
            if let Some(reason) = &choice.finish_reason {
                acc.finish_reason = Some(reason.clone());
            }
        }

        // Function-call arguments arrive as streamed string fragments; only
        // parse once the stream has finished accumulating them.
        for tc in &mut acc.tool_calls {
            if let Some(raw) = tc.params.as_str() {
                tc.params = serde_json::from_str(raw).unwrap_or(json!({}));
            }
        }

        Ok(LlmResponse {
            text: acc.text,
            tool_calls: acc.tool_calls,
            token_usage: acc.usage,
            finish_reason: acc.finish_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convert_message_carries_tool_call_id_for_tool_role() {
        let msg = LlmMessage {
            role: LlmMessageRole::Tool,
            content: "42".to_string(),
            tool_calls: None,
            tool_call_id: Some("call_1".to_string()),
        };
        let converted = OpenAiProvider::convert_message(&msg);
        assert_eq!(converted.role, "tool");
        assert_eq!(converted.tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn tool_call_delta_accumulates_sharded_arguments() {
        let mut acc = Vec::new();
        let first = OpenAiDelta {
            content: None,
            tool_calls: Some(vec![crate::types::OpenAiStreamToolCall {
                index: 0,
                id: Some("call_1".to_string()),
                function: Some(crate::types::OpenAiStreamFunction {
                    name: Some("search".to_string()),
                    arguments: Some(r#"{"query":"#.to_string()),
                }),
            }]),
        };
        let second = OpenAiDelta {
            content: None,
            tool_calls: Some(vec![crate::types::OpenAiStreamToolCall {
                index: 0,
                id: None,
                function: Some(crate::types::OpenAiStreamFunction {
                    name: None,
                    arguments: Some(r#""rust"}"#.to_string()),
                }),
            }]),
        };
        apply_tool_call_delta(&mut acc, &first);
        apply_tool_call_delta(&mut acc, &second);
        assert_eq!(acc.len(), 1);
        assert_eq!(acc[0].name, "search");
        assert_eq!(acc[0].params.as_str().unwrap(), r#"{"query":"rust"}"#);
    }
}
