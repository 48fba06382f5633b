// Ordered message log for one session (spec.md §4.3).

use meridian_contracts::{Message, MessageContent, MessageRole};

pub const DEFAULT_MESSAGE_CHAR_CAP: usize = 50_000;
pub const DEFAULT_SUMMARIZE_THRESHOLD: usize = 20;
pub const DEFAULT_PRESERVED_TAIL: usize = 5;

/// Strip ASCII/Unicode control characters other than newline and tab.
pub fn strip_control_chars(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}

/// Maintains the ordered message log for one session: sanitizes on append and
/// summarizes prefixes on demand, never touching the initial system message
/// or the most recent `preserved_tail` messages.
#[derive(Debug, Clone)]
pub struct MessageHistoryManager {
    pub message_char_cap: usize,
    pub summarize_threshold: usize,
    pub preserved_tail: usize,
}

impl Default for MessageHistoryManager {
    fn default() -> Self {
        Self {
            message_char_cap: DEFAULT_MESSAGE_CHAR_CAP,
            summarize_threshold: DEFAULT_SUMMARIZE_THRESHOLD,
            preserved_tail: DEFAULT_PRESERVED_TAIL,
        }
    }
}

impl MessageHistoryManager {
    /// Sanitize `message` in place: strip control characters and truncate to
    /// the per-message character cap. Handle-ref content (already previewed
    /// by the tool executor) passes through untouched.
    pub fn sanitize(&self, message: &Message) -> Message {
        let mut sanitized = message.clone();
        let has_handle_ref = message
            .content
            .parts
            .iter()
            .any(|p| matches!(p, meridian_contracts::ContentPart::HandleRef { .. }));
        if !has_handle_ref {
            let cleaned = strip_control_chars(&message.content.as_plain_text());
            let truncated: String = cleaned.chars().take(self.message_char_cap).collect();
            sanitized.content = MessageContent::text(truncated);
        }
        sanitized
    }

    pub fn append(&self, history: &mut Vec<Message>, message: Message) {
        history.push(self.sanitize(&message));
    }

    pub fn needs_summarization(&self, history: &[Message]) -> bool {
        history.len() > self.summarize_threshold
    }

    /// Build the sanitized, handle-free input to feed a summarization LLM
    /// call: roles, tool names, and previews only — never raw large outputs.
    pub fn summarization_input(&self, history: &[Message]) -> Vec<String> {
        let start = self.system_message_count(history);
        let end = history.len().saturating_sub(self.preserved_tail).max(start);
        history[start..end]
            .iter()
            .map(|m| {
                let tool = m
                    .tool_calls
                    .as_ref()
                    .map(|calls| {
                        calls
                            .iter()
                            .map(|c| c.name.clone())
                            .collect::<Vec<_>>()
                            .join(",")
                    })
                    .unwrap_or_default();
                let preview: String = m.content.as_plain_text().chars().take(500).collect();
                format!("[{}] tools=({tool}) {preview}", m.role)
            })
            .collect()
    }

    /// Replace the summarizable prefix with a single synthetic assistant
    /// message carrying `summary`. The initial system message and the last
    /// `preserved_tail` messages are kept untouched.
    pub fn summarize(&self, history: &[Message], summary: String) -> Vec<Message> {
        let start = self.system_message_count(history);
        let tail_start = history.len().saturating_sub(self.preserved_tail).max(start);
        let mut result = history[..start].to_vec();
        result.push(Message::assistant(summary));
        result.extend(history[tail_start..].iter().cloned());
        result
    }

    /// Fallback when summarization itself fails: keep the system message and
    /// the last `preserved_tail` messages, discarding the middle outright.
    pub fn fallback_truncate(&self, history: &[Message]) -> Vec<Message> {
        let start = self.system_message_count(history);
        let tail_start = history.len().saturating_sub(self.preserved_tail).max(start);
        let mut result = history[..start].to_vec();
        result.extend(history[tail_start..].iter().cloned());
        result
    }

    fn system_message_count(&self, history: &[Message]) -> usize {
        history
            .iter()
            .take_while(|m| m.role == MessageRole::System)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_truncates_to_char_cap() {
        let manager = MessageHistoryManager {
            message_char_cap: 10,
            ..Default::default()
        };
        let msg = Message::user("a".repeat(100));
        let sanitized = manager.sanitize(&msg);
        assert_eq!(sanitized.text().chars().count(), 10);
    }

    #[test]
    fn summarize_preserves_system_message_and_tail() {
        let manager = MessageHistoryManager {
            preserved_tail: 2,
            ..Default::default()
        };
        let mut history = vec![Message::system("you are helpful")];
        for i in 0..10 {
            history.push(Message::user(format!("msg {i}")));
        }
        let summarized = manager.summarize(&history, "summary of earlier turns".to_string());
        assert_eq!(summarized[0].role, MessageRole::System);
        assert_eq!(summarized[1].text(), "summary of earlier turns");
        assert_eq!(summarized.len(), 1 + 1 + 2);
    }
}
