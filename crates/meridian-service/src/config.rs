// Layered runtime configuration (spec.md §4.0.2): built-in defaults, then an
// optional TOML file, then environment variable overrides. `dotenvy` loads a
// `.env` in dev, matching the teacher's `everruns-api` startup sequence.

use std::path::PathBuf;

use serde::Deserialize;

use meridian_epic::EpicConfig;

use crate::profile::DEFAULT_CLASSIFIER_MODEL;

fn default_bind_addr() -> String {
    "0.0.0.0:8090".to_string()
}

fn default_agent_id() -> String {
    "default".to_string()
}

/// Partial, all-optional mirror of `RuntimeProfile` as read from a TOML file
/// (`MERIDIAN_CONFIG_FILE`). Every field overrides the built-in default when
/// present; everything else is left untouched.
#[derive(Debug, Default, Deserialize)]
struct RuntimeProfileFile {
    bind_addr: Option<String>,
    default_agent_id: Option<String>,
    auto_epic: Option<bool>,
    classifier_model: Option<String>,
    classifier_confidence_threshold: Option<f32>,
    epic_max_rounds: Option<u32>,
    epic_planner_count: Option<usize>,
    epic_worker_count: Option<usize>,
    epic_judge_count: Option<usize>,
    nesting_depth_cap: Option<usize>,
    state_dir: Option<PathBuf>,
}

/// Process-wide configuration for `meridian-service`'s binary entry points
/// (SPEC_FULL.md §4.0.2). This is not part of the core library contract: it
/// exists because a running service needs *a* concrete profile source, not
/// because its schema is load-bearing elsewhere.
#[derive(Debug, Clone)]
pub struct RuntimeProfile {
    pub bind_addr: String,
    /// Agent id used when a request doesn't name one.
    pub default_agent_id: String,
    pub auto_epic: bool,
    pub classifier_model: String,
    pub classifier_confidence_threshold: f32,
    pub epic: EpicConfig,
    /// Cap on sub-agent nesting depth (spec.md §4.10); enforced by the
    /// configured `SubAgentSpawner`.
    pub nesting_depth_cap: usize,
    /// Directory of `AgentDefinition` config files, if configured.
    pub config_dir: Option<PathBuf>,
    /// Directory of plugin manifests, if configured.
    pub plugin_dir: Option<PathBuf>,
    /// Directory of slash-command markdown files, if configured.
    pub slash_command_dir: Option<PathBuf>,
    /// Directory `FileStateStore` persists `SessionState` under.
    pub state_dir: PathBuf,
}

impl Default for RuntimeProfile {
    fn default() -> Self {
        let epic = EpicConfig::default();
        Self {
            bind_addr: default_bind_addr(),
            default_agent_id: default_agent_id(),
            auto_epic: true,
            classifier_model: DEFAULT_CLASSIFIER_MODEL.to_string(),
            classifier_confidence_threshold: meridian_epic::classifier::DEFAULT_CONFIDENCE_THRESHOLD,
            epic,
            nesting_depth_cap: meridian_core::spawner::DEFAULT_MAX_NESTING_DEPTH,
            config_dir: None,
            plugin_dir: None,
            slash_command_dir: None,
            state_dir: PathBuf::from("./data/state"),
        }
    }
}

impl RuntimeProfile {
    fn merge_file(mut self, file: RuntimeProfileFile) -> Self {
        if let Some(v) = file.bind_addr {
            self.bind_addr = v;
        }
        if let Some(v) = file.default_agent_id {
            self.default_agent_id = v;
        }
        if let Some(v) = file.auto_epic {
            self.auto_epic = v;
        }
        if let Some(v) = file.classifier_model {
            self.classifier_model = v;
        }
        if let Some(v) = file.classifier_confidence_threshold {
            self.classifier_confidence_threshold = v;
        }
        if let Some(v) = file.epic_max_rounds {
            self.epic.max_rounds = v;
        }
        if let Some(v) = file.epic_planner_count {
            self.epic.planner_count = v;
        }
        if let Some(v) = file.epic_worker_count {
            self.epic.worker_count = v;
        }
        if let Some(v) = file.epic_judge_count {
            self.epic.judge_count = v;
        }
        if let Some(v) = file.nesting_depth_cap {
            self.nesting_depth_cap = v;
        }
        if let Some(v) = file.state_dir {
            self.state_dir = v;
        }
        self
    }

    fn apply_env(mut self) -> Self {
        if let Ok(v) = std::env::var("MERIDIAN_BIND_ADDR") {
            self.bind_addr = v;
        }
        if let Ok(v) = std::env::var("MERIDIAN_DEFAULT_AGENT_ID") {
            self.default_agent_id = v;
        }
        if let Ok(v) = std::env::var("MERIDIAN_AUTO_EPIC") {
            self.auto_epic = v.eq_ignore_ascii_case("true") || v == "1";
        }
        if let Ok(v) = std::env::var("MERIDIAN_CLASSIFIER_MODEL") {
            self.classifier_model = v;
        }
        if let Ok(v) = std::env::var("MERIDIAN_CLASSIFIER_CONFIDENCE_THRESHOLD") {
            if let Ok(parsed) = v.parse() {
                self.classifier_confidence_threshold = parsed;
            }
        }
        if let Ok(v) = std::env::var("MERIDIAN_EPIC_MAX_ROUNDS") {
            if let Ok(parsed) = v.parse() {
                self.epic.max_rounds = parsed;
            }
        }
        if let Ok(v) = std::env::var("MERIDIAN_EPIC_WORKER_COUNT") {
            if let Ok(parsed) = v.parse() {
                self.epic.worker_count = parsed;
            }
        }
        if let Ok(v) = std::env::var("MERIDIAN_NESTING_DEPTH_CAP") {
            if let Ok(parsed) = v.parse() {
                self.nesting_depth_cap = parsed;
            }
        }
        if let Ok(v) = std::env::var("MERIDIAN_CONFIG_DIR") {
            self.config_dir = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("MERIDIAN_PLUGIN_DIR") {
            self.plugin_dir = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("MERIDIAN_SLASH_COMMAND_DIR") {
            self.slash_command_dir = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("MERIDIAN_STATE_DIR") {
            self.state_dir = PathBuf::from(v);
        }
        self
    }

    /// Loads defaults, then `MERIDIAN_CONFIG_FILE` (if set and readable),
    /// then environment variable overrides. Never fails: a missing or
    /// malformed config file just falls back to defaults, matching the
    /// teacher's permissive `from_env` style.
    pub fn load() -> Self {
        let _ = dotenvy::dotenv();

        let mut profile = Self::default();
        if let Ok(path) = std::env::var("MERIDIAN_CONFIG_FILE") {
            if let Ok(raw) = std::fs::read_to_string(&path) {
                if let Ok(file) = toml::from_str::<RuntimeProfileFile>(&raw) {
                    profile = profile.merge_file(file);
                }
            }
        }
        profile.apply_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable_without_any_env_or_file() {
        let profile = RuntimeProfile::default();
        assert_eq!(profile.bind_addr, "0.0.0.0:8090");
        assert!(profile.auto_epic);
        assert_eq!(profile.epic.worker_count, EpicConfig::default().worker_count);
    }

    #[test]
    fn file_overrides_layer_over_defaults() {
        let file = RuntimeProfileFile {
            auto_epic: Some(false),
            epic_worker_count: Some(7),
            ..Default::default()
        };
        let profile = RuntimeProfile::default().merge_file(file);
        assert!(!profile.auto_epic);
        assert_eq!(profile.epic.worker_count, 7);
        assert_eq!(profile.bind_addr, "0.0.0.0:8090");
    }
}
