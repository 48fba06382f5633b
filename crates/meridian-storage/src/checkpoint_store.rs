// In-memory CheckpointStore (spec.md §4.13): coarse-grained resumable
// markers saved at step boundaries, independent of the finer-grained
// WorkflowCheckpoint used by the resumable workflow runtime.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use meridian_contracts::{CheckpointRecord, SessionId};
use meridian_core::error::Result;
use meridian_core::CheckpointStore;

#[derive(Default)]
pub struct InMemoryCheckpointStore {
    checkpoints: Mutex<HashMap<SessionId, Vec<CheckpointRecord>>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn save(&self, checkpoint: CheckpointRecord) -> Result<()> {
        self.checkpoints
            .lock()
            .unwrap()
            .entry(checkpoint.session_id.clone())
            .or_default()
            .push(checkpoint);
        Ok(())
    }

    async fn latest(&self, session_id: &SessionId) -> Result<Option<CheckpointRecord>> {
        Ok(self
            .checkpoints
            .lock()
            .unwrap()
            .get(session_id)
            .and_then(|cps| cps.iter().max_by_key(|c| c.step_id).cloned()))
    }

    async fn list(&self, session_id: &SessionId) -> Result<Vec<CheckpointRecord>> {
        Ok(self
            .checkpoints
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(session_id: &SessionId, step_id: u64) -> CheckpointRecord {
        CheckpointRecord {
            session_id: session_id.clone(),
            step_id,
            marker: serde_json::json!({"step": step_id}),
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn latest_picks_highest_step_id() {
        let store = InMemoryCheckpointStore::new();
        let session_id = SessionId::new_root();
        store.save(record(&session_id, 1)).await.unwrap();
        store.save(record(&session_id, 3)).await.unwrap();
        store.save(record(&session_id, 2)).await.unwrap();

        let latest = store.latest(&session_id).await.unwrap().unwrap();
        assert_eq!(latest.step_id, 3);
        assert_eq!(store.list(&session_id).await.unwrap().len(), 3);
    }
}
