// In-memory WorkflowCheckpointStore (spec.md §4.18).

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use meridian_contracts::WorkflowCheckpoint;
use meridian_core::error::Result;
use meridian_core::WorkflowCheckpointStore;

#[derive(Default)]
pub struct InMemoryWorkflowCheckpointStore {
    checkpoints: Mutex<HashMap<String, WorkflowCheckpoint>>,
}

impl InMemoryWorkflowCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowCheckpointStore for InMemoryWorkflowCheckpointStore {
    async fn save(&self, checkpoint: WorkflowCheckpoint) -> Result<()> {
        self.checkpoints
            .lock()
            .unwrap()
            .insert(checkpoint.run_id.clone(), checkpoint);
        Ok(())
    }

    async fn latest(&self, run_id: &str) -> Result<Option<WorkflowCheckpoint>> {
        Ok(self.checkpoints.lock().unwrap().get(run_id).cloned())
    }
}
