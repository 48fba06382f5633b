// Optimistic task claim board (spec.md §4.11-§4.12): planners publish tasks
// here, workers claim them, judges observe none of this directly.
//
// Claim tie-break is priority descending, then age ascending. Tasks don't
// carry their own timestamp field, so age is read off the millisecond clock
// embedded in each task's UUIDv7 id — the same id planners already mint via
// `EpicTask::new`.

use std::collections::HashMap;
use std::sync::Mutex;

use meridian_contracts::{EpicTask, EpicTaskStatus, MeridianError, SessionId};
use meridian_core::error::Result;

#[derive(Default)]
pub struct TaskBoard {
    tasks: Mutex<HashMap<String, EpicTask>>,
}

fn task_age_millis(task: &EpicTask) -> u64 {
    uuid::Uuid::parse_str(&task.id)
        .ok()
        .and_then(|id| id.get_timestamp())
        .map(|ts| {
            let (secs, nanos) = ts.to_unix();
            secs * 1000 + (nanos as u64) / 1_000_000
        })
        .unwrap_or(0)
}

impl TaskBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, task: EpicTask) {
        self.tasks.lock().unwrap().insert(task.id.clone(), task);
    }

    /// Claims the highest-priority (then oldest) pending task whose
    /// `task_type` is in `allowed_types`, assigning it to `worker_id`.
    pub fn request(&self, worker_id: &str, allowed_types: &[String]) -> Option<EpicTask> {
        let mut tasks = self.tasks.lock().unwrap();
        let claimed_id = tasks
            .values()
            .filter(|t| {
                t.status == EpicTaskStatus::Pending
                    && allowed_types.iter().any(|ty| ty == &t.task_type)
            })
            .min_by(|a, b| {
                // Reverse priority so higher priority sorts first, then age ascending.
                b.priority
                    .cmp(&a.priority)
                    .then_with(|| task_age_millis(a).cmp(&task_age_millis(b)))
            })
            .map(|t| t.id.clone())?;

        let task = tasks.get_mut(&claimed_id).expect("claimed_id came from this map");
        task.status = EpicTaskStatus::InProgress;
        task.assigned_worker_session = Some(SessionId::from_string(worker_id));
        task.version += 1;
        Some(task.clone())
    }

    pub fn complete(&self, task_id: &str, _summary: String) -> Result<()> {
        let mut tasks = self.tasks.lock().unwrap();
        let task = tasks
            .get_mut(task_id)
            .ok_or_else(|| MeridianError::Internal(anyhow::anyhow!("unknown task {task_id}")))?;
        task.status = EpicTaskStatus::Completed;
        task.version += 1;
        Ok(())
    }

    pub fn fail(&self, task_id: &str, _error: String) -> Result<()> {
        let mut tasks = self.tasks.lock().unwrap();
        let task = tasks
            .get_mut(task_id)
            .ok_or_else(|| MeridianError::Internal(anyhow::anyhow!("unknown task {task_id}")))?;
        task.status = EpicTaskStatus::Failed;
        task.version += 1;
        Ok(())
    }

    /// Drops every task belonging to `run_id` (used by FRESH_START).
    pub fn clear_run(&self, run_id: &str) {
        self.tasks.lock().unwrap().retain(|_, t| t.run_id != run_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(run_id: &str, priority: u8, task_type: &str) -> EpicTask {
        EpicTask::new(run_id, "title", "description")
            .with_priority(priority)
            .with_type(task_type)
    }

    #[test]
    fn claims_highest_priority_first() {
        let board = TaskBoard::new();
        board.publish(task("run-1", 3, "code"));
        board.publish(task("run-1", 9, "code"));
        board.publish(task("run-1", 5, "code"));

        let allowed = vec!["code".to_string()];
        let claimed = board.request("worker-1", &allowed).unwrap();
        assert_eq!(claimed.priority, 9);
        assert_eq!(claimed.status, EpicTaskStatus::InProgress);
    }

    #[test]
    fn request_ignores_disallowed_types() {
        let board = TaskBoard::new();
        board.publish(task("run-1", 5, "research"));

        let allowed = vec!["code".to_string()];
        assert!(board.request("worker-1", &allowed).is_none());
    }

    #[test]
    fn clear_run_only_drops_matching_run() {
        let board = TaskBoard::new();
        board.publish(task("run-1", 5, "code"));
        board.publish(task("run-2", 5, "code"));
        board.clear_run("run-1");

        let allowed = vec!["code".to_string()];
        let remaining = board.request("worker-1", &allowed).unwrap();
        assert_eq!(remaining.run_id, "run-2");
    }
}
