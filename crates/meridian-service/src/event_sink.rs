// Routes `StreamEvent`s through the message bus instead of a dedicated
// per-request channel: one `BusEventSink` is shared by every agent the
// factory builds, and a streaming caller subscribes to the topic for the
// one session it cares about before the run starts (spec.md §4.16).

use async_trait::async_trait;

use meridian_contracts::{MeridianError, SessionId, StreamEvent};
use meridian_core::error::Result;
use meridian_core::{BusMessage, EventSink, MessageBus};
use std::sync::Arc;

pub fn session_topic(session_id: &SessionId) -> String {
    format!("session:{}:events", session_id.as_str())
}

pub struct BusEventSink {
    bus: Arc<dyn MessageBus>,
}

impl BusEventSink {
    pub fn new(bus: Arc<dyn MessageBus>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl EventSink for BusEventSink {
    async fn emit(&self, event: StreamEvent) -> Result<()> {
        let topic = session_topic(&event.session_id);
        let payload = serde_json::to_value(&event)
            .map_err(|e| MeridianError::Internal(anyhow::anyhow!(e)))?;
        self.bus.publish(&topic, BusMessage::new(topic.clone(), payload)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_bus::InProcessMessageBus;
    use meridian_contracts::StreamEventPayload;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn emitted_events_are_readable_from_the_session_topic() {
        let bus = Arc::new(InProcessMessageBus::new());
        let sink = BusEventSink::new(bus.clone());
        let session_id = SessionId::new_root();

        let mut subscription = bus.subscribe(&session_topic(&session_id)).await.unwrap();

        sink.emit(StreamEvent::new(
            session_id.clone(),
            0,
            StreamEventPayload::FinalAnswer {
                content: "done".to_string(),
                token_usage: Default::default(),
            },
        ))
        .await
        .unwrap();

        let cancel = CancellationToken::new();
        let received = subscription.recv(&cancel).await.unwrap();
        let decoded: StreamEvent = serde_json::from_value(received.payload).unwrap();
        assert_eq!(decoded.session_id, session_id);
    }
}
