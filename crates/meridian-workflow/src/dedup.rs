// Idempotence window for inbound resume events (spec.md §4.18): a resume
// event is deduplicated by message id, or by a payload hash when no id is
// given, over a sliding window so a re-delivered webhook or a resent chat
// message doesn't re-enter the engine twice.

use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use crate::runtime::ResumeOutcome;

/// Sender-supplied identifiers for one inbound resume event.
#[derive(Debug, Clone, Default)]
pub struct SenderMetadata {
    pub message_id: Option<String>,
    pub sender: Option<String>,
}

const DEFAULT_WINDOW: usize = 200;

pub fn dedup_key(payload: &serde_json::Value, sender_metadata: &SenderMetadata) -> String {
    if let Some(id) = &sender_metadata.message_id {
        return format!("id:{id}");
    }
    // serde_json's object serialization preserves insertion order, so this
    // hash is stable for a given sender re-sending the identical payload.
    let canonical = serde_json::to_string(payload).unwrap_or_default();
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    canonical.hash(&mut hasher);
    format!("hash:{:x}", hasher.finish())
}

struct Window {
    capacity: usize,
    entries: VecDeque<String>,
    results: HashMap<String, ResumeOutcome>,
}

impl Window {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::new(),
            results: HashMap::new(),
        }
    }

    fn check(&self, key: &str) -> Option<ResumeOutcome> {
        self.results.get(key).cloned()
    }

    fn record(&mut self, key: String, outcome: ResumeOutcome) {
        if self.results.contains_key(&key) {
            return;
        }
        self.entries.push_back(key.clone());
        self.results.insert(key, outcome);
        while self.entries.len() > self.capacity {
            if let Some(oldest) = self.entries.pop_front() {
                self.results.remove(&oldest);
            }
        }
    }
}

/// Per-run sliding window of recently-seen resume event keys.
#[derive(Default)]
pub struct ResumeDedup {
    windows: Mutex<HashMap<String, Window>>,
}

impl ResumeDedup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&self, run_id: &str, key: &str) -> Option<ResumeOutcome> {
        self.windows.lock().unwrap().get(run_id).and_then(|w| w.check(key))
    }

    pub fn record(&self, run_id: &str, key: String, outcome: ResumeOutcome) {
        self.windows
            .lock()
            .unwrap()
            .entry(run_id.to_string())
            .or_insert_with(|| Window::new(DEFAULT_WINDOW))
            .record(key, outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_message_id_dedups_regardless_of_payload() {
        let dedup = ResumeDedup::new();
        let meta = SenderMetadata {
            message_id: Some("msg-1".into()),
            sender: None,
        };
        let key_a = dedup_key(&serde_json::json!({"a": 1}), &meta);
        let key_b = dedup_key(&serde_json::json!({"a": 2}), &meta);
        assert_eq!(key_a, key_b);
    }

    #[test]
    fn window_evicts_oldest_past_capacity() {
        let mut window = Window::new(2);
        window.record("a".into(), ResumeOutcome::Duplicate);
        window.record("b".into(), ResumeOutcome::Duplicate);
        window.record("c".into(), ResumeOutcome::Duplicate);
        assert!(window.check("a").is_none());
        assert!(window.check("c").is_some());
    }
}
