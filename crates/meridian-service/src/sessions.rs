// Thin session-management facade backing `GET /sessions`, `GET
// /sessions/{id}`, `DELETE /sessions/{id}` (spec.md §6).

use std::sync::Arc;

use meridian_contracts::{Session, SessionId};
use meridian_core::error::Result;
use meridian_core::StateStore;

pub struct SessionsService {
    state_store: Arc<dyn StateStore>,
}

impl SessionsService {
    pub fn new(state_store: Arc<dyn StateStore>) -> Self {
        Self { state_store }
    }

    pub async fn list(&self) -> Result<Vec<Session>> {
        let mut sessions = Vec::new();
        for session_id in self.state_store.list().await? {
            if let Some(state) = self.state_store.load(&session_id).await? {
                sessions.push(Session::from(&state));
            }
        }
        Ok(sessions)
    }

    pub async fn get(&self, session_id: &SessionId) -> Result<Option<Session>> {
        Ok(self.state_store.load(session_id).await?.as_ref().map(Session::from))
    }

    pub async fn delete(&self, session_id: &SessionId) -> Result<()> {
        self.state_store.delete(session_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_storage::InMemoryStateStore;

    #[tokio::test]
    async fn deleted_session_no_longer_appears_in_list() {
        let store = Arc::new(InMemoryStateStore::default());
        let session_id = SessionId::new_root();
        let state = meridian_contracts::SessionState::new(session_id.clone(), "agent-1".to_string());
        store.save(state, 0).await.unwrap();

        let service = SessionsService::new(store);
        assert_eq!(service.list().await.unwrap().len(), 1);

        service.delete(&session_id).await.unwrap();
        assert!(service.list().await.unwrap().is_empty());
        assert!(service.get(&session_id).await.unwrap().is_none());
    }
}
