// Session and Mission entities (spec.md §3).

use std::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::message::Message;
use crate::plan::Plan;

/// The user's natural-language goal, plus optional structured hints.
/// Immutable once a run starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Mission {
    pub text: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub preferred_worker_count: Option<usize>,
}

impl Mission {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            scopes: Vec::new(),
            preferred_worker_count: None,
        }
    }
}

impl fmt::Display for Mission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// A hierarchical session identifier.
///
/// A root session id is a plain UUID string. A sub-agent's id is formed by
/// appending `:sub_<role>_<short-random>` to its parent's id (spec.md §3).
/// Nesting depth is the number of `:` separators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new_root() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Construct a child session id nested under this one.
    pub fn child(&self, role: &str) -> Self {
        let suffix: String = rand::thread_rng()
            .sample_iter(&rand::distributions::Alphanumeric)
            .take(6)
            .map(char::from)
            .collect::<String>()
            .to_lowercase();
        Self(format!("{}:sub_{}_{}", self.0, role, suffix))
    }

    /// Nesting depth, counted by `:` separators (spec.md §8 property 10).
    pub fn depth(&self) -> usize {
        self.0.matches(':').count()
    }

    pub fn root(&self) -> &str {
        self.0.split(':').next().unwrap_or(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A question pending a user reply (spec.md §3 `PendingQuestion`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingQuestion {
    pub question: String,
    pub required_inputs: serde_json::Value,
}

/// The full persisted state of one session (the "state blob" of spec.md §4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: SessionId,
    pub agent_id: String,
    pub messages: Vec<Message>,
    pub plan: Option<Plan>,
    /// Tool-result handles known to this session, by the tool-call id that produced them.
    #[serde(default)]
    pub tool_result_handles: Vec<String>,
    pub pending_question: Option<PendingQuestion>,
    pub updated_at: DateTime<Utc>,
    /// Version as last *persisted*; callers track the expected next version separately.
    pub version: u64,
}

impl SessionState {
    pub fn new(session_id: SessionId, agent_id: impl Into<String>) -> Self {
        Self {
            session_id,
            agent_id: agent_id.into(),
            messages: Vec::new(),
            plan: None,
            tool_result_handles: Vec::new(),
            pending_question: None,
            updated_at: Utc::now(),
            version: 0,
        }
    }
}

/// Lightweight session descriptor returned by `list()`/`GET /sessions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Session {
    pub session_id: SessionId,
    pub agent_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl From<&SessionState> for Session {
    fn from(s: &SessionState) -> Self {
        Self {
            session_id: s.session_id.clone(),
            agent_id: s.agent_id.clone(),
            created_at: s.updated_at,
            updated_at: s.updated_at,
            version: s.version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_session_id_nests_and_increments_depth() {
        let root = SessionId::new_root();
        assert_eq!(root.depth(), 0);
        let child = root.child("researcher");
        assert_eq!(child.depth(), 1);
        assert!(child.as_str().starts_with(root.as_str()));
        let grandchild = child.child("writer");
        assert_eq!(grandchild.depth(), 2);
    }

    #[test]
    fn root_extracts_the_top_level_uuid() {
        let root = SessionId::new_root();
        let child = root.child("a").child("b");
        assert_eq!(child.root(), root.as_str());
    }
}
