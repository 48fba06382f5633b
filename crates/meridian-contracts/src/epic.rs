// EpicRun / EpicTask (spec.md §3, §4.11, §6 "Persisted layout").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::{Mission, SessionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpicTaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Blocked,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpicTask {
    pub id: String,
    pub run_id: String,
    pub title: String,
    pub description: String,
    pub task_type: String,
    /// 1 (lowest) - 10 (highest).
    pub priority: u8,
    pub status: EpicTaskStatus,
    #[serde(default)]
    pub relevant_files: Vec<String>,
    #[serde(default)]
    pub dependency_task_ids: Vec<String>,
    pub assigned_worker_session: Option<SessionId>,
    /// Optimistic claim version (spec.md §3 "Ownership").
    pub version: u64,
}

impl EpicTask {
    pub fn new(run_id: impl Into<String>, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            run_id: run_id.into(),
            title: title.into(),
            description: description.into(),
            task_type: "generic".to_string(),
            priority: 5,
            status: EpicTaskStatus::Pending,
            relevant_files: Vec::new(),
            dependency_task_ids: Vec::new(),
            assigned_worker_session: None,
            version: 0,
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority.clamp(1, 10);
        self
    }

    pub fn with_type(mut self, task_type: impl Into<String>) -> Self {
        self.task_type = task_type.into();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JudgeDecision {
    Continue,
    FreshStart,
    Complete,
}

impl JudgeDecision {
    /// Keyword-matching fallback for free-form judge replies (spec.md §9 Open Question 3).
    pub fn parse_loose(text: &str) -> Self {
        let upper = text.to_uppercase();
        if upper.contains("COMPLETE") {
            JudgeDecision::Complete
        } else if upper.contains("FRESH_START") || upper.contains("FRESH START") {
            JudgeDecision::FreshStart
        } else {
            // Unknown responses default to CONTINUE (spec.md §4.11, §7).
            JudgeDecision::Continue
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round_number: u32,
    pub tasks_issued: usize,
    pub worker_summaries: Vec<String>,
    pub judge_decision: JudgeDecision,
    pub judge_summary: String,
    pub recorded_at: DateTime<Utc>,
}

/// An epic run, persisted as `MISSION` / `CURRENT_STATE` / `MEMORY` documents
/// under a run-specific directory (spec.md §3, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpicRun {
    pub run_id: String,
    pub mission: Mission,
    pub scopes: Vec<String>,
    pub round_number: u32,
    pub current_state: String,
    pub memory: Vec<RoundRecord>,
    pub latest_judge_decision: Option<JudgeDecision>,
    pub created_at: DateTime<Utc>,
}

impl EpicRun {
    pub fn new(mission: Mission) -> Self {
        Self {
            run_id: uuid::Uuid::now_v7().to_string(),
            scopes: mission.scopes.clone(),
            mission,
            round_number: 0,
            current_state: String::new(),
            memory: Vec::new(),
            latest_judge_decision: None,
            created_at: Utc::now(),
        }
    }
}
