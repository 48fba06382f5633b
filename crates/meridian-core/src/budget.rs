// Heuristic token accounting (spec.md §4.7).

use meridian_contracts::Message;

const DEFAULT_CHARS_PER_TOKEN: usize = 4;
const DEFAULT_MESSAGE_OVERHEAD_TOKENS: u64 = 10;
const DEFAULT_TOOL_SCHEMA_OVERHEAD_TOKENS: u64 = 50;
const DEFAULT_SYSTEM_PROMPT_OVERHEAD_TOKENS: u64 = 100;
const DEFAULT_MAX_INPUT_TOKENS: u64 = 100_000;
const DEFAULT_COMPRESSION_TRIGGER_RATIO: f64 = 0.8;

/// Result of a budget preflight check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetDecision {
    Ok,
    ShouldCompress,
    OverBudget,
}

/// Estimates token usage for a prospective LLM call and decides whether the
/// message history needs compression before the call is made.
#[derive(Debug, Clone)]
pub struct TokenBudgeter {
    pub chars_per_token: usize,
    pub message_overhead_tokens: u64,
    pub tool_schema_overhead_tokens: u64,
    pub system_prompt_overhead_tokens: u64,
    pub max_input_tokens: u64,
    pub compression_trigger_ratio: f64,
}

impl Default for TokenBudgeter {
    fn default() -> Self {
        Self {
            chars_per_token: DEFAULT_CHARS_PER_TOKEN,
            message_overhead_tokens: DEFAULT_MESSAGE_OVERHEAD_TOKENS,
            tool_schema_overhead_tokens: DEFAULT_TOOL_SCHEMA_OVERHEAD_TOKENS,
            system_prompt_overhead_tokens: DEFAULT_SYSTEM_PROMPT_OVERHEAD_TOKENS,
            max_input_tokens: DEFAULT_MAX_INPUT_TOKENS,
            compression_trigger_ratio: DEFAULT_COMPRESSION_TRIGGER_RATIO,
        }
    }
}

impl TokenBudgeter {
    pub fn compression_trigger(&self) -> u64 {
        (self.max_input_tokens as f64 * self.compression_trigger_ratio) as u64
    }

    fn chars_to_tokens(&self, chars: usize) -> u64 {
        (chars / self.chars_per_token.max(1)) as u64
    }

    /// Estimate total input tokens for `messages` + `tool_count` tool schemas
    /// + an optional context pack, including the system-prompt overhead.
    pub fn estimate(
        &self,
        messages: &[Message],
        tool_count: usize,
        context_pack: Option<&str>,
    ) -> u64 {
        let mut total = self.system_prompt_overhead_tokens;
        for message in messages {
            total += self.message_overhead_tokens;
            total += self.chars_to_tokens(message.content.char_len());
        }
        total += tool_count as u64 * self.tool_schema_overhead_tokens;
        if let Some(pack) = context_pack {
            total += self.chars_to_tokens(pack.chars().count());
        }
        total
    }

    pub fn should_compress(&self, messages: &[Message], tool_count: usize) -> bool {
        self.estimate(messages, tool_count, None) >= self.compression_trigger()
    }

    pub fn is_over_budget(&self, messages: &[Message], tool_count: usize) -> bool {
        self.estimate(messages, tool_count, None) >= self.max_input_tokens
    }

    pub fn decide(&self, messages: &[Message], tool_count: usize) -> BudgetDecision {
        if self.is_over_budget(messages, tool_count) {
            BudgetDecision::OverBudget
        } else if self.should_compress(messages, tool_count) {
            BudgetDecision::ShouldCompress
        } else {
            BudgetDecision::Ok
        }
    }

    /// Truncate a message's plain-text content to `max_chars`, returning a new
    /// message. Used by the loop's preflight sanitization pass (spec.md §4.7).
    pub fn sanitize_message(&self, message: &Message, max_chars: usize) -> Message {
        let mut sanitized = message.clone();
        let text = crate::history::strip_control_chars(&message.content.as_plain_text());
        let truncated: String = text.chars().take(max_chars).collect();
        sanitized.content = meridian_contracts::MessageContent::text(truncated);
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_grows_with_message_count() {
        let budgeter = TokenBudgeter::default();
        let few = vec![Message::user("hi")];
        let many: Vec<Message> = (0..50).map(|_| Message::user("hello there")).collect();
        assert!(budgeter.estimate(&many, 0, None) > budgeter.estimate(&few, 0, None));
    }

    #[test]
    fn over_budget_when_estimate_exceeds_max() {
        let mut budgeter = TokenBudgeter::default();
        budgeter.max_input_tokens = 10;
        let messages = vec![Message::user("a".repeat(1000))];
        assert_eq!(budgeter.decide(&messages, 0), BudgetDecision::OverBudget);
    }
}
