// Lenient parsing of a planner agent's free-form reply into `EpicTask`s
// (spec.md §4.11a). Planners are asked to reply with a JSON array; this
// tolerates the model wrapping it in prose or a code fence.

use serde::Deserialize;

use meridian_contracts::EpicTask;

#[derive(Deserialize)]
struct RawTask {
    title: String,
    description: String,
    #[serde(default = "default_task_type")]
    task_type: String,
    #[serde(default = "default_priority")]
    priority: u8,
}

fn default_task_type() -> String {
    "generic".to_string()
}

fn default_priority() -> u8 {
    5
}

fn extract_json_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (end > start).then(|| &text[start..=end])
}

/// Returns an empty vec on any parse failure — a planner round that produces
/// nothing usable is a no-op round, not an error (spec.md §4.11e).
pub fn parse_tasks(run_id: &str, text: &str) -> Vec<EpicTask> {
    let candidate = extract_json_array(text).unwrap_or(text);
    let raw: Vec<RawTask> = serde_json::from_str(candidate).unwrap_or_default();
    raw.into_iter()
        .map(|r| {
            EpicTask::new(run_id, r.title, r.description)
                .with_type(r.task_type)
                .with_priority(r.priority)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_array_wrapped_in_prose() {
        let text = r#"Here is the plan:
[{"title": "Write tests", "description": "cover the billing module", "task_type": "code", "priority": 8}]
Let me know if you need more."#;
        let tasks = parse_tasks("run-1", text);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "Write tests");
        assert_eq!(tasks[0].priority, 8);
        assert_eq!(tasks[0].task_type, "code");
    }

    #[test]
    fn malformed_text_yields_no_tasks() {
        assert!(parse_tasks("run-1", "I couldn't come up with a plan.").is_empty());
    }
}
