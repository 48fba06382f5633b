// Execution profile: the named bundle of routing and model configuration an
// executor call runs under (spec.md §4.16-§4.17, §6 `run mission --profile`).

use meridian_epic::EpicConfig;

pub const DEFAULT_CLASSIFIER_MODEL: &str = "fast-classifier";

/// A CLI `--auto-epic` / `--no-auto-epic` override, or a forced route that
/// bypasses the classifier entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Simple,
    Epic,
}

#[derive(Debug, Clone)]
pub struct ExecutionProfile {
    /// Which `AgentDefinition` drives the ordinary (non-epic) pipeline.
    pub agent_id: String,
    pub auto_epic: bool,
    pub classifier_model: String,
    pub classifier_confidence_threshold: f32,
    pub epic: EpicConfig,
    /// CLI override that skips classification entirely (spec.md §4.17).
    pub forced_mode: Option<ExecutionMode>,
}

impl ExecutionProfile {
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            auto_epic: true,
            classifier_model: DEFAULT_CLASSIFIER_MODEL.to_string(),
            classifier_confidence_threshold: meridian_epic::classifier::DEFAULT_CONFIDENCE_THRESHOLD,
            epic: EpicConfig::default(),
            forced_mode: None,
        }
    }

    pub fn with_forced_mode(mut self, mode: ExecutionMode) -> Self {
        self.forced_mode = Some(mode);
        self
    }

    pub fn without_auto_epic(mut self) -> Self {
        self.auto_epic = false;
        self
    }

    /// Builds the default profile for `agent_id` from a loaded `RuntimeProfile`.
    pub fn from_runtime(agent_id: impl Into<String>, runtime: &crate::config::RuntimeProfile) -> Self {
        Self {
            agent_id: agent_id.into(),
            auto_epic: runtime.auto_epic,
            classifier_model: runtime.classifier_model.clone(),
            classifier_confidence_threshold: runtime.classifier_confidence_threshold,
            epic: runtime.epic.clone(),
            forced_mode: None,
        }
    }
}
