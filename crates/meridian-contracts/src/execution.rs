// ExecutionResult (spec.md §3).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Completed,
    Failed,
    MaxStepsReached,
    Cancelled,
    WaitingExternal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    pub fn add(&mut self, other: &TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub final_answer: Option<String>,
    pub error_message: Option<String>,
    pub error_kind: Option<String>,
    pub step_count: usize,
    pub token_usage: TokenUsage,
}

impl ExecutionResult {
    pub fn completed(final_answer: impl Into<String>, step_count: usize, token_usage: TokenUsage) -> Self {
        Self {
            status: ExecutionStatus::Completed,
            final_answer: Some(final_answer.into()),
            error_message: None,
            error_kind: None,
            step_count,
            token_usage,
        }
    }

    pub fn failed(error_kind: impl Into<String>, error_message: impl Into<String>, step_count: usize) -> Self {
        Self {
            status: ExecutionStatus::Failed,
            final_answer: None,
            error_message: Some(error_message.into()),
            error_kind: Some(error_kind.into()),
            step_count,
            token_usage: TokenUsage::default(),
        }
    }

    pub fn max_steps(step_count: usize) -> Self {
        Self {
            status: ExecutionStatus::MaxStepsReached,
            final_answer: None,
            error_message: None,
            error_kind: Some("MaxStepsReached".to_string()),
            step_count,
            token_usage: TokenUsage::default(),
        }
    }

    pub fn cancelled(step_count: usize) -> Self {
        Self {
            status: ExecutionStatus::Cancelled,
            final_answer: None,
            error_message: None,
            error_kind: Some("Cancelled".to_string()),
            step_count,
            token_usage: TokenUsage::default(),
        }
    }

    pub fn waiting_external(step_count: usize) -> Self {
        Self {
            status: ExecutionStatus::WaitingExternal,
            final_answer: None,
            error_message: None,
            error_kind: None,
            step_count,
            token_usage: TokenUsage::default(),
        }
    }
}
