// Auto-epic classifier (spec.md §4.17): one cheap LLM call deciding whether
// a mission should route to the ordinary agent pipeline or the epic
// orchestrator.

use std::sync::Arc;

use serde::Deserialize;

use meridian_contracts::Mission;
use meridian_core::error::Result;
use meridian_core::traits::{LlmCallConfig, LlmMessage, LlmMessageRole};
use meridian_core::LlmProvider;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Complexity {
    Simple,
    Complex,
}

#[derive(Debug, Clone)]
pub struct ClassifierVerdict {
    pub complexity: Complexity,
    pub confidence: f32,
    pub reason: String,
}

impl ClassifierVerdict {
    fn fallback(reason: impl Into<String>) -> Self {
        Self {
            complexity: Complexity::Simple,
            confidence: 0.0,
            reason: reason.into(),
        }
    }
}

#[derive(Deserialize)]
struct RawVerdict {
    complexity: String,
    confidence: f32,
    #[serde(default)]
    reason: String,
}

fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn parse_verdict(text: &str) -> Option<ClassifierVerdict> {
    let candidate = extract_json_object(text).unwrap_or(text);
    let raw: RawVerdict = serde_json::from_str(candidate).ok()?;
    let complexity = match raw.complexity.to_lowercase().as_str() {
        "complex" => Complexity::Complex,
        _ => Complexity::Simple,
    };
    Some(ClassifierVerdict {
        complexity,
        confidence: raw.confidence,
        reason: raw.reason,
    })
}

const CLASSIFIER_SYSTEM_PROMPT: &str = r#"You classify whether a mission needs a single agent or a multi-round planner/worker/judge orchestration. Reply with only a JSON object: {"complexity": "simple"|"complex", "confidence": 0.0-1.0, "reason": "..."}"#;

pub struct AutoEpicClassifier {
    llm_provider: Arc<dyn LlmProvider>,
    model: String,
    confidence_threshold: f32,
}

impl AutoEpicClassifier {
    pub fn new(llm_provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            llm_provider,
            model: model.into(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }

    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Any LLM error, unparseable reply, or confidence below threshold
    /// yields `Complexity::Simple` (spec.md §4.17 fallback policy).
    pub async fn classify(&self, mission: &Mission) -> ClassifierVerdict {
        let messages = vec![
            LlmMessage {
                role: LlmMessageRole::System,
                content: CLASSIFIER_SYSTEM_PROMPT.to_string(),
                tool_calls: None,
                tool_call_id: None,
            },
            LlmMessage {
                role: LlmMessageRole::User,
                content: mission.to_string(),
                tool_calls: None,
                tool_call_id: None,
            },
        ];
        let config = LlmCallConfig::new(self.model.clone());

        let response = match self.llm_provider.chat_completion(messages, &config).await {
            Ok(response) => response,
            Err(e) => return ClassifierVerdict::fallback(format!("classifier call failed: {e}")),
        };

        match parse_verdict(&response.text) {
            Some(verdict) if verdict.confidence >= self.confidence_threshold => verdict,
            Some(verdict) => ClassifierVerdict::fallback(format!(
                "confidence {:.2} below threshold: {}",
                verdict.confidence, verdict.reason
            )),
            None => ClassifierVerdict::fallback("malformed classifier response"),
        }
    }
}

pub fn classify_result_is_complex(verdict: &ClassifierVerdict) -> bool {
    matches!(verdict.complexity, Complexity::Complex)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use meridian_core::traits::LlmResponse;

    struct StubProvider {
        text: String,
    }

    #[async_trait]
    impl LlmProvider for StubProvider {
        async fn chat_completion(
            &self,
            _messages: Vec<LlmMessage>,
            _config: &LlmCallConfig,
        ) -> Result<LlmResponse> {
            Ok(LlmResponse {
                text: self.text.clone(),
                ..Default::default()
            })
        }
    }

    #[tokio::test]
    async fn confident_complex_verdict_passes_through() {
        let classifier = AutoEpicClassifier::new(
            Arc::new(StubProvider {
                text: r#"{"complexity": "complex", "confidence": 0.9, "reason": "multi-file refactor"}"#.to_string(),
            }),
            "fast-model",
        );
        let verdict = classifier.classify(&Mission::new("refactor the billing module")).await;
        assert!(classify_result_is_complex(&verdict));
    }

    #[tokio::test]
    async fn low_confidence_falls_back_to_simple() {
        let classifier = AutoEpicClassifier::new(
            Arc::new(StubProvider {
                text: r#"{"complexity": "complex", "confidence": 0.2, "reason": "unsure"}"#.to_string(),
            }),
            "fast-model",
        );
        let verdict = classifier.classify(&Mission::new("what time is it")).await;
        assert!(!classify_result_is_complex(&verdict));
    }

    #[tokio::test]
    async fn malformed_reply_falls_back_to_simple() {
        let classifier = AutoEpicClassifier::new(
            Arc::new(StubProvider {
                text: "not json at all".to_string(),
            }),
            "fast-model",
        );
        let verdict = classifier.classify(&Mission::new("anything")).await;
        assert!(!classify_result_is_complex(&verdict));
    }
}
