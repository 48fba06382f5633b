// In-memory StateStore (spec.md §4.1).

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use meridian_contracts::{MeridianError, SessionId, SessionState};
use meridian_core::error::Result;
use meridian_core::StateStore;

/// Version-checked session state, held entirely in process memory. Crash
/// safety is not provided (state is lost on restart) — use `FileStateStore`
/// when that matters.
#[derive(Default)]
pub struct InMemoryStateStore {
    sessions: Mutex<HashMap<SessionId, SessionState>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn load(&self, session_id: &SessionId) -> Result<Option<SessionState>> {
        Ok(self.sessions.lock().unwrap().get(session_id).cloned())
    }

    async fn save(&self, mut state: SessionState, expected_version: u64) -> Result<()> {
        let mut sessions = self.sessions.lock().unwrap();
        let current_version = sessions.get(&state.session_id).map(|s| s.version).unwrap_or(0);
        if current_version != expected_version {
            return Err(MeridianError::VersionConflict {
                expected: expected_version,
                found: current_version,
            });
        }
        state.version = expected_version + 1;
        state.updated_at = Utc::now();
        sessions.insert(state.session_id.clone(), state);
        Ok(())
    }

    async fn delete(&self, session_id: &SessionId) -> Result<()> {
        self.sessions.lock().unwrap().remove(session_id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<SessionId>> {
        Ok(self.sessions.lock().unwrap().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_rejects_stale_expected_version() {
        let store = InMemoryStateStore::new();
        let session_id = SessionId::new_root();
        let state = SessionState::new(session_id.clone(), "agent-1");
        store.save(state.clone(), 0).await.unwrap();

        let loaded = store.load(&session_id).await.unwrap().unwrap();
        assert_eq!(loaded.version, 1);

        let err = store.save(state, 0).await.unwrap_err();
        assert!(matches!(err, MeridianError::VersionConflict { .. }));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = InMemoryStateStore::new();
        let session_id = SessionId::new_root();
        store.delete(&session_id).await.unwrap();
        store.delete(&session_id).await.unwrap();
    }
}
