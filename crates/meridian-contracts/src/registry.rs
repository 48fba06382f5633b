// AgentDefinition — the normalized model produced by the four definition
// sources of spec.md §4.14.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefinitionSourceKind {
    ConfigFile,
    UserOverride,
    Plugin,
    SlashCommand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanningStrategyTag {
    DirectReactive,
    PlanThenExecute,
    InterleavedPlanAndAct,
    SensePlanActReflect,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub agent_id: String,
    pub name: String,
    pub source: DefinitionSourceKind,
    /// Whether later-loaded sources may override this definition by id.
    pub mutable: bool,

    pub system_prompt: String,
    pub specialist_tag: Option<String>,
    pub planning_strategy: PlanningStrategyTag,
    pub max_steps: usize,
    /// Logical role ("primary", "reflection", "fast-classifier", ...) -> model id.
    pub model_roles: std::collections::HashMap<String, String>,

    pub tool_names: Vec<String>,
    pub mcp_servers: Vec<String>,

    pub base_profile: Option<String>,
    pub work_directory: Option<String>,
}

impl AgentDefinition {
    pub fn minimal(agent_id: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            name: "unnamed".to_string(),
            source: DefinitionSourceKind::UserOverride,
            mutable: true,
            system_prompt: system_prompt.into(),
            specialist_tag: None,
            planning_strategy: PlanningStrategyTag::DirectReactive,
            max_steps: 30,
            model_roles: std::collections::HashMap::new(),
            tool_names: Vec::new(),
            mcp_servers: Vec::new(),
            base_profile: None,
            work_directory: None,
        }
    }
}
