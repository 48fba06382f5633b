// Assembles the per-turn prompt (spec.md §4.4).

use meridian_contracts::{Plan, PlanItemStatus};

pub const DEFAULT_CONTEXT_PACK_CHAR_CAP: usize = 10_000;

/// Builds the system prompt, plan status block, and context pack for one turn.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    pub context_pack_char_cap: usize,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self {
            context_pack_char_cap: DEFAULT_CONTEXT_PACK_CHAR_CAP,
        }
    }
}

impl ContextBuilder {
    /// Render the agent's base system prompt, optionally augmented with a
    /// compact specialist index (names of sub-agent specialist tags the
    /// current agent may delegate to).
    pub fn system_prompt(&self, base_prompt: &str, specialist_index: &[String]) -> String {
        if specialist_index.is_empty() {
            return base_prompt.to_string();
        }
        format!(
            "{base_prompt}\n\nAvailable specialists for delegation: {}",
            specialist_index.join(", ")
        )
    }

    /// Render an ordered plan status block with the next actionable item
    /// highlighted, or `None` if the strategy carries no plan.
    pub fn plan_status_block(&self, plan: Option<&Plan>) -> Option<String> {
        let plan = plan?;
        if plan.items.is_empty() {
            return None;
        }
        let next_actionable = plan.next_actionable().map(|i| i.position);
        let mut block = String::from("Plan:\n");
        for item in &plan.items {
            let marker = match item.status {
                PlanItemStatus::Pending => "[ ]",
                PlanItemStatus::InProgress => "[~]",
                PlanItemStatus::Completed => "[x]",
                PlanItemStatus::Failed => "[!]",
                PlanItemStatus::Skipped => "[-]",
            };
            let highlight = if Some(item.position) == next_actionable {
                " <- next"
            } else {
                ""
            };
            block.push_str(&format!(
                "{marker} {}. {}{highlight}\n",
                item.position, item.description
            ));
        }
        Some(block)
    }

    /// Cap a context pack of small pinned facts/results to the configured
    /// character limit.
    pub fn context_pack(&self, facts: &[String]) -> Option<String> {
        if facts.is_empty() {
            return None;
        }
        let joined = facts.join("\n");
        Some(joined.chars().take(self.context_pack_char_cap).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_contracts::PlanItem;

    #[test]
    fn plan_status_block_highlights_next_actionable() {
        let builder = ContextBuilder::default();
        let plan = Plan::new(vec![
            PlanItem::new(0, "step one"),
            PlanItem::new(1, "step two").with_dependencies(vec![0]),
        ]);
        let block = builder.plan_status_block(Some(&plan)).unwrap();
        assert!(block.contains("step one <- next"));
        assert!(!block.contains("step two <- next"));
    }

    #[test]
    fn context_pack_caps_length() {
        let builder = ContextBuilder {
            context_pack_char_cap: 5,
        };
        let pack = builder.context_pack(&["abcdefgh".to_string()]).unwrap();
        assert_eq!(pack.chars().count(), 5);
    }
}
