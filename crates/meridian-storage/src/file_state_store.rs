// File-backed StateStore (spec.md §4.1): crash-safe because every save
// writes to a temp file and renames it into place, so a crash mid-write
// leaves either the old file or the new one, never a partial one.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use meridian_contracts::{MeridianError, SessionId, SessionState};
use meridian_core::error::Result;
use meridian_core::StateStore;

pub struct FileStateStore {
    directory: PathBuf,
    // Serializes writes so the read-check-write sequence behind the
    // version check is itself atomic within this process.
    write_lock: Mutex<()>,
}

impl FileStateStore {
    pub async fn new(directory: impl Into<PathBuf>) -> std::io::Result<Self> {
        let directory = directory.into();
        tokio::fs::create_dir_all(&directory).await?;
        Ok(Self {
            directory,
            write_lock: Mutex::new(()),
        })
    }

    fn path_for(&self, session_id: &SessionId) -> PathBuf {
        let encoded = session_id.as_str().replace([':', '/'], "_");
        self.directory.join(format!("{encoded}.json"))
    }

    async fn read_state(&self, path: &Path) -> Result<Option<SessionState>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => {
                let state = serde_json::from_slice(&bytes)
                    .map_err(|e| MeridianError::Internal(anyhow::anyhow!(e)))?;
                Ok(Some(state))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(MeridianError::Internal(anyhow::anyhow!(e))),
        }
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self, session_id: &SessionId) -> Result<Option<SessionState>> {
        self.read_state(&self.path_for(session_id)).await
    }

    async fn save(&self, mut state: SessionState, expected_version: u64) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let path = self.path_for(&state.session_id);
        let current_version = self.read_state(&path).await?.map(|s| s.version).unwrap_or(0);
        if current_version != expected_version {
            return Err(MeridianError::VersionConflict {
                expected: expected_version,
                found: current_version,
            });
        }
        state.version = expected_version + 1;
        state.updated_at = Utc::now();

        let serialized = serde_json::to_vec_pretty(&state)
            .map_err(|e| MeridianError::Internal(anyhow::anyhow!(e)))?;
        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &serialized)
            .await
            .map_err(|e| MeridianError::Internal(anyhow::anyhow!(e)))?;
        tokio::fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| MeridianError::Internal(anyhow::anyhow!(e)))?;
        Ok(())
    }

    async fn delete(&self, session_id: &SessionId) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(self.path_for(session_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MeridianError::Internal(anyhow::anyhow!(e))),
        }
    }

    async fn list(&self) -> Result<Vec<SessionId>> {
        let mut ids = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.directory)
            .await
            .map_err(|e| MeridianError::Internal(anyhow::anyhow!(e)))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| MeridianError::Internal(anyhow::anyhow!(e)))?
        {
            if entry.path().extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(state) = self.read_state(&entry.path()).await? {
                ids.push(state.session_id);
            }
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_through_disk() {
        let dir = tempdir();
        let store = FileStateStore::new(&dir).await.unwrap();
        let session_id = SessionId::new_root();
        let state = SessionState::new(session_id.clone(), "agent-1");
        store.save(state, 0).await.unwrap();

        let loaded = store.load(&session_id).await.unwrap().unwrap();
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.agent_id, "agent-1");

        let err = store
            .save(SessionState::new(session_id, "agent-1"), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, MeridianError::VersionConflict { .. }));

        let _ = std::fs::remove_dir_all(&dir);
    }

    fn tempdir() -> PathBuf {
        std::env::temp_dir().join(format!("meridian-state-store-test-{}", uuid::Uuid::now_v7()))
    }
}
