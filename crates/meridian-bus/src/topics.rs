// Typed pub/sub over named topics (spec.md §4.12, first half).
//
// Backed by `tokio::sync::broadcast`: every subscriber sees every message in
// FIFO order. `OverflowPolicy::DropOldest` is the channel's native behavior
// once a slow subscriber falls more than `capacity` messages behind;
// `OverflowPolicy::Block` is layered on top by having `publish` await until
// the channel has room, so a slow consumer applies backpressure to publishers
// instead of silently losing messages.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use meridian_core::{BusMessage, BusSubscription, OverflowPolicy};

const BLOCK_POLL_INTERVAL: Duration = Duration::from_millis(5);

pub struct TopicRegistry {
    capacity: usize,
    overflow_policy: OverflowPolicy,
    senders: Mutex<HashMap<String, broadcast::Sender<BusMessage>>>,
}

impl TopicRegistry {
    pub fn new(capacity: usize, overflow_policy: OverflowPolicy) -> Self {
        Self {
            capacity,
            overflow_policy,
            senders: Mutex::new(HashMap::new()),
        }
    }

    fn sender_for(&self, topic: &str) -> broadcast::Sender<BusMessage> {
        let mut senders = self.senders.lock().unwrap();
        senders
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    pub async fn publish(&self, topic: &str, message: BusMessage) {
        let sender = self.sender_for(topic);
        if self.overflow_policy == OverflowPolicy::Block {
            while sender.len() >= self.capacity {
                tokio::time::sleep(BLOCK_POLL_INTERVAL).await;
            }
        }
        // Err here only means nobody is currently subscribed; the message is
        // simply not delivered to anyone, which is not a publish failure.
        let _ = sender.send(message);
    }

    pub fn subscribe(&self, topic: &str) -> Box<dyn BusSubscription> {
        Box::new(TopicSubscription {
            rx: self.sender_for(topic).subscribe(),
        })
    }

    pub fn clear(&self, topic: &str) {
        self.senders.lock().unwrap().remove(topic);
    }
}

struct TopicSubscription {
    rx: broadcast::Receiver<BusMessage>,
}

#[async_trait]
impl BusSubscription for TopicSubscription {
    async fn recv(&mut self, cancel: &CancellationToken) -> Option<BusMessage> {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return None,
                res = self.rx.recv() => match res {
                    Ok(message) => return Some(message),
                    // A lagging subscriber skips forward rather than stalling.
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                },
            }
        }
    }
}
