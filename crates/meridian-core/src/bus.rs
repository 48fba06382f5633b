// Message bus trait seam (spec.md §4.12). Concrete in-process implementation
// lives in meridian-bus; a distributed backend would implement the same
// trait without the core or the epic orchestrator needing to know.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use meridian_contracts::EpicTask;

use crate::error::Result;

/// Overflow behavior when a topic's bounded buffer is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Publisher awaits until a slot frees up (spec.md §4.12 default).
    Block,
    /// Oldest buffered message for lagging subscribers is discarded.
    DropOldest,
}

impl Default for OverflowPolicy {
    fn default() -> Self {
        OverflowPolicy::Block
    }
}

/// A message carried on a topic.
#[derive(Debug, Clone)]
pub struct BusMessage {
    pub topic: String,
    pub payload: serde_json::Value,
    pub published_at: DateTime<Utc>,
}

impl BusMessage {
    pub fn new(topic: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            topic: topic.into(),
            payload,
            published_at: Utc::now(),
        }
    }
}

/// A live, cancellable subscription to one topic. Ordering is per-topic FIFO.
#[async_trait]
pub trait BusSubscription: Send {
    /// Waits for the next message, or `None` if `cancel` fires or the topic closes.
    async fn recv(&mut self, cancel: &CancellationToken) -> Option<BusMessage>;
}

/// Typed pub/sub plus an optimistic task queue, used for epic coordination
/// (spec.md §4.11-§4.12). One bus instance is shared by every planner,
/// worker and judge session in a run.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publishes `message` on `topic`. Never blocks indefinitely under
    /// `OverflowPolicy::DropOldest`; may await briefly under `Block`.
    async fn publish(&self, topic: &str, message: BusMessage) -> Result<()>;

    /// Subscribes to `topic`. The returned subscription only sees messages
    /// published after the call.
    async fn subscribe(&self, topic: &str) -> Result<Box<dyn BusSubscription>>;

    /// Publishes a task onto the claimable board for its run (spec.md §4.11a).
    async fn publish_task(&self, task: EpicTask) -> Result<()>;

    /// Optimistically claims the highest-priority pending task whose
    /// `task_type` is in `allowed_types`, assigning it to `worker_id`.
    /// Returns `None` if no matching task is pending.
    async fn request_task(
        &self,
        worker_id: &str,
        allowed_types: &[String],
    ) -> Result<Option<EpicTask>>;

    async fn complete_task(&self, task_id: &str, summary: String) -> Result<()>;

    async fn fail_task(&self, task_id: &str, error: String) -> Result<()>;

    /// Drops all buffered messages and pending tasks on `topic` (used by FRESH_START).
    async fn clear(&self, topic: &str) -> Result<()>;
}
