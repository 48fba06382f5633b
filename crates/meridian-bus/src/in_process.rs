use async_trait::async_trait;

use meridian_contracts::EpicTask;
use meridian_core::error::Result;
use meridian_core::{BusMessage, BusSubscription, MessageBus, OverflowPolicy};

use crate::task_board::TaskBoard;
use crate::topics::TopicRegistry;

const DEFAULT_TOPIC_CAPACITY: usize = 1024;

/// Topic the task board publishes a notification to whenever a task is
/// added for `run_id`, so workers can `subscribe` instead of polling.
pub fn task_topic(run_id: &str) -> String {
    format!("epic:{run_id}:tasks")
}

pub struct InProcessMessageBus {
    topics: TopicRegistry,
    tasks: TaskBoard,
}

impl InProcessMessageBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TOPIC_CAPACITY, OverflowPolicy::default())
    }

    pub fn with_capacity(capacity: usize, overflow_policy: OverflowPolicy) -> Self {
        Self {
            topics: TopicRegistry::new(capacity, overflow_policy),
            tasks: TaskBoard::new(),
        }
    }
}

impl Default for InProcessMessageBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageBus for InProcessMessageBus {
    async fn publish(&self, topic: &str, message: BusMessage) -> Result<()> {
        self.topics.publish(topic, message).await;
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Box<dyn BusSubscription>> {
        Ok(self.topics.subscribe(topic))
    }

    async fn publish_task(&self, task: EpicTask) -> Result<()> {
        let topic = task_topic(&task.run_id);
        let notice = BusMessage::new(topic.clone(), serde_json::json!({"task_id": task.id}));
        self.tasks.publish(task);
        self.topics.publish(&topic, notice).await;
        Ok(())
    }

    async fn request_task(
        &self,
        worker_id: &str,
        allowed_types: &[String],
    ) -> Result<Option<EpicTask>> {
        Ok(self.tasks.request(worker_id, allowed_types))
    }

    async fn complete_task(&self, task_id: &str, summary: String) -> Result<()> {
        self.tasks.complete(task_id, summary)
    }

    async fn fail_task(&self, task_id: &str, error: String) -> Result<()> {
        self.tasks.fail(task_id, error)
    }

    async fn clear(&self, topic: &str) -> Result<()> {
        self.topics.clear(topic);
        if let Some(run_id) = topic.strip_prefix("epic:").and_then(|s| s.strip_suffix(":tasks")) {
            self.tasks.clear_run(run_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn publish_then_subscribe_sees_fifo_order() {
        let bus = InProcessMessageBus::new();
        let mut sub = bus.subscribe("events").await.unwrap();
        bus.publish("events", BusMessage::new("events", serde_json::json!(1)))
            .await
            .unwrap();
        bus.publish("events", BusMessage::new("events", serde_json::json!(2)))
            .await
            .unwrap();

        let cancel = CancellationToken::new();
        let first = sub.recv(&cancel).await.unwrap();
        let second = sub.recv(&cancel).await.unwrap();
        assert_eq!(first.payload, serde_json::json!(1));
        assert_eq!(second.payload, serde_json::json!(2));
    }

    #[tokio::test]
    async fn task_round_trip_through_request_and_complete() {
        let bus = InProcessMessageBus::new();
        let task = EpicTask::new("run-1", "title", "description").with_type("code");
        let task_id = task.id.clone();
        bus.publish_task(task).await.unwrap();

        let claimed = bus
            .request_task("worker-1", &["code".to_string()])
            .await
            .unwrap()
            .expect("task should be claimable");
        assert_eq!(claimed.id, task_id);

        // Already claimed — a second request must see nothing pending.
        assert!(bus
            .request_task("worker-2", &["code".to_string()])
            .await
            .unwrap()
            .is_none());

        bus.complete_task(&task_id, "done".to_string()).await.unwrap();
    }

    #[tokio::test]
    async fn clear_drops_topic_and_run_tasks() {
        let bus = InProcessMessageBus::new();
        let topic = task_topic("run-1");
        bus.publish_task(EpicTask::new("run-1", "t", "d").with_type("code"))
            .await
            .unwrap();
        bus.clear(&topic).await.unwrap();

        assert!(bus
            .request_task("worker-1", &["code".to_string()])
            .await
            .unwrap()
            .is_none());
    }
}
