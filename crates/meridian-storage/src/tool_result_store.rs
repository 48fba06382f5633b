// In-memory ToolResultStore (spec.md §4.2).

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use meridian_contracts::{MeridianError, SessionId};
use meridian_core::error::Result;
use meridian_core::ToolResultStore;

#[derive(Default)]
pub struct InMemoryToolResultStore {
    // keyed by (session_id, handle); handles are opaque and unique per session.
    entries: Mutex<HashMap<(SessionId, String), serde_json::Value>>,
}

impl InMemoryToolResultStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ToolResultStore for InMemoryToolResultStore {
    async fn put(&self, session_id: &SessionId, value: &serde_json::Value) -> Result<String> {
        let handle = uuid::Uuid::now_v7().to_string();
        self.entries
            .lock()
            .unwrap()
            .insert((session_id.clone(), handle.clone()), value.clone());
        Ok(handle)
    }

    async fn fetch(&self, session_id: &SessionId, handle: &str) -> Result<serde_json::Value> {
        self.entries
            .lock()
            .unwrap()
            .get(&(session_id.clone(), handle.to_string()))
            .cloned()
            .ok_or_else(|| MeridianError::HandleNotFound(handle.to_string()))
    }

    async fn delete(&self, session_id: &SessionId, handle: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap()
            .remove(&(session_id.clone(), handle.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fetch_missing_handle_fails() {
        let store = InMemoryToolResultStore::new();
        let session_id = SessionId::new_root();
        let err = store.fetch(&session_id, "nonexistent").await.unwrap_err();
        assert!(matches!(err, MeridianError::HandleNotFound(_)));
    }

    #[tokio::test]
    async fn put_then_fetch_round_trips() {
        let store = InMemoryToolResultStore::new();
        let session_id = SessionId::new_root();
        let payload = serde_json::json!({"x": 1});
        let handle = store.put(&session_id, &payload).await.unwrap();
        let fetched = store.fetch(&session_id, &handle).await.unwrap();
        assert_eq!(fetched, payload);
    }
}
