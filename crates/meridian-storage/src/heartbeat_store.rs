// In-memory HeartbeatStore (spec.md §4.13).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use meridian_contracts::{HeartbeatRecord, LivenessTag, SessionId};
use meridian_core::error::Result;
use meridian_core::HeartbeatStore;

#[derive(Default)]
pub struct InMemoryHeartbeatStore {
    beats: Mutex<HashMap<SessionId, HeartbeatRecord>>,
}

impl InMemoryHeartbeatStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HeartbeatStore for InMemoryHeartbeatStore {
    async fn beat(&self, session_id: &SessionId, progress_marker: Option<String>) -> Result<()> {
        self.beats.lock().unwrap().insert(
            session_id.clone(),
            HeartbeatRecord {
                session_id: session_id.clone(),
                timestamp: Utc::now(),
                liveness: LivenessTag::Alive,
                progress_marker,
            },
        );
        Ok(())
    }

    async fn get(&self, session_id: &SessionId) -> Result<Option<HeartbeatRecord>> {
        Ok(self.beats.lock().unwrap().get(session_id).cloned())
    }

    async fn list_stale(&self, ttl: Duration) -> Result<Vec<HeartbeatRecord>> {
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero());
        Ok(self
            .beats
            .lock()
            .unwrap()
            .values()
            .filter(|r| now.signed_duration_since(r.timestamp) >= ttl)
            .map(|r| HeartbeatRecord {
                liveness: LivenessTag::Stale,
                ..r.clone()
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fresh_beat_is_not_stale() {
        let store = InMemoryHeartbeatStore::new();
        let session_id = SessionId::new_root();
        store.beat(&session_id, Some("step-1".into())).await.unwrap();

        let stale = store.list_stale(Duration::from_secs(60)).await.unwrap();
        assert!(stale.is_empty());

        let latest = store.get(&session_id).await.unwrap().unwrap();
        assert_eq!(latest.progress_marker.as_deref(), Some("step-1"));
    }

    #[tokio::test]
    async fn zero_ttl_marks_every_beat_stale() {
        let store = InMemoryHeartbeatStore::new();
        let session_id = SessionId::new_root();
        store.beat(&session_id, None).await.unwrap();

        let stale = store.list_stale(Duration::from_secs(0)).await.unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].liveness, LivenessTag::Stale);
    }
}
