// Agent factory and definition registry (spec.md §4.14, SPEC_FULL.md §4.19).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use meridian_contracts::{AgentDefinition, DefinitionSourceKind, MeridianError, PlanningStrategyTag};

use crate::error::Result;
use crate::loop_engine::{AgentLoop, LoopConfig};
use crate::strategies::{DirectReactive, InterleavedPlanAndAct, PlanThenExecute, PlanningStrategy, SensePlanActReflect};
use crate::tool_executor::ToolExecutor;
use crate::tool_registry::ToolRegistry;
use crate::traits::{EventSink, LlmProvider, StateStore};

/// One of the four sources `AgentDefinition`s are aggregated from
/// (SPEC_FULL.md §4.19). Each normalizes whatever it reads into the shared
/// `AgentDefinition` model.
#[async_trait]
pub trait DefinitionSource: Send + Sync {
    fn kind(&self) -> DefinitionSourceKind;

    async fn load(&self) -> Result<Vec<AgentDefinition>>;
}

/// A TOML/YAML configuration file listing agent definitions.
pub struct ConfigFileSource {
    pub path: std::path::PathBuf,
}

#[derive(Deserialize)]
struct ConfigFileDocument {
    #[serde(default)]
    agents: Vec<AgentDefinitionDoc>,
}

#[derive(Deserialize)]
struct AgentDefinitionDoc {
    agent_id: String,
    name: String,
    system_prompt: String,
    #[serde(default)]
    specialist_tag: Option<String>,
    #[serde(default)]
    planning_strategy: Option<PlanningStrategyTag>,
    #[serde(default)]
    max_steps: Option<usize>,
    #[serde(default)]
    model_roles: HashMap<String, String>,
    #[serde(default)]
    tool_names: Vec<String>,
    #[serde(default)]
    mcp_servers: Vec<String>,
    #[serde(default)]
    base_profile: Option<String>,
    #[serde(default)]
    work_directory: Option<String>,
}

#[async_trait]
impl DefinitionSource for ConfigFileSource {
    fn kind(&self) -> DefinitionSourceKind {
        DefinitionSourceKind::ConfigFile
    }

    async fn load(&self) -> Result<Vec<AgentDefinition>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(_) => return Ok(Vec::new()),
        };
        let doc: ConfigFileDocument = if self.path.extension().and_then(|e| e.to_str()) == Some("toml") {
            toml::from_str(&raw).map_err(|e| MeridianError::Internal(anyhow::anyhow!(e)))?
        } else {
            serde_yaml::from_str(&raw).map_err(|e| MeridianError::Internal(anyhow::anyhow!(e)))?
        };
        Ok(doc
            .agents
            .into_iter()
            .map(|d| AgentDefinition {
                agent_id: d.agent_id,
                name: d.name,
                source: DefinitionSourceKind::ConfigFile,
                mutable: false,
                system_prompt: d.system_prompt,
                specialist_tag: d.specialist_tag,
                planning_strategy: d.planning_strategy.unwrap_or(PlanningStrategyTag::DirectReactive),
                max_steps: d.max_steps.unwrap_or(30),
                model_roles: d.model_roles,
                tool_names: d.tool_names,
                mcp_servers: d.mcp_servers,
                base_profile: d.base_profile,
                work_directory: d.work_directory,
            })
            .collect())
    }
}

/// Ad-hoc overrides supplied at runtime, e.g. from an API request body.
#[derive(Default)]
pub struct UserOverrideSource {
    pub definitions: Vec<AgentDefinition>,
}

#[async_trait]
impl DefinitionSource for UserOverrideSource {
    fn kind(&self) -> DefinitionSourceKind {
        DefinitionSourceKind::UserOverride
    }

    async fn load(&self) -> Result<Vec<AgentDefinition>> {
        Ok(self.definitions.clone())
    }
}

/// Scans a fixed local directory of `plugin.toml` manifests. Concrete plugin
/// discovery (remote registries, versioning) is out of scope; this loader
/// only reads whatever manifests are already on disk.
pub struct PluginManifestSource {
    pub directory: std::path::PathBuf,
}

#[async_trait]
impl DefinitionSource for PluginManifestSource {
    fn kind(&self) -> DefinitionSourceKind {
        DefinitionSourceKind::Plugin
    }

    async fn load(&self) -> Result<Vec<AgentDefinition>> {
        let mut definitions = Vec::new();
        let Ok(mut entries) = tokio::fs::read_dir(&self.directory).await else {
            return Ok(definitions);
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let manifest_path = entry.path().join("plugin.toml");
            let Ok(raw) = tokio::fs::read_to_string(&manifest_path).await else {
                continue;
            };
            if let Ok(doc) = toml::from_str::<AgentDefinitionDoc>(&raw) {
                definitions.push(AgentDefinition {
                    agent_id: doc.agent_id,
                    name: doc.name,
                    source: DefinitionSourceKind::Plugin,
                    mutable: false,
                    system_prompt: doc.system_prompt,
                    specialist_tag: doc.specialist_tag,
                    planning_strategy: doc.planning_strategy.unwrap_or(PlanningStrategyTag::DirectReactive),
                    max_steps: doc.max_steps.unwrap_or(30),
                    model_roles: doc.model_roles,
                    tool_names: doc.tool_names,
                    mcp_servers: doc.mcp_servers,
                    base_profile: doc.base_profile,
                    work_directory: doc.work_directory,
                });
            }
        }
        Ok(definitions)
    }
}

/// Markdown files with a YAML frontmatter block, one agent definition per
/// file — the CLI-facing "slash-command files" source.
pub struct SlashCommandSource {
    pub directory: std::path::PathBuf,
}

#[async_trait]
impl DefinitionSource for SlashCommandSource {
    fn kind(&self) -> DefinitionSourceKind {
        DefinitionSourceKind::SlashCommand
    }

    async fn load(&self) -> Result<Vec<AgentDefinition>> {
        let mut definitions = Vec::new();
        let Ok(mut entries) = tokio::fs::read_dir(&self.directory).await else {
            return Ok(definitions);
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            let Ok(raw) = tokio::fs::read_to_string(&path).await else {
                continue;
            };
            let Some((frontmatter, body)) = split_frontmatter(&raw) else {
                continue;
            };
            if let Ok(mut doc) = serde_yaml::from_str::<AgentDefinitionDoc>(frontmatter) {
                if doc.system_prompt.is_empty() {
                    doc.system_prompt = body.trim().to_string();
                }
                definitions.push(AgentDefinition {
                    agent_id: doc.agent_id,
                    name: doc.name,
                    source: DefinitionSourceKind::SlashCommand,
                    mutable: true,
                    system_prompt: doc.system_prompt,
                    specialist_tag: doc.specialist_tag,
                    planning_strategy: doc.planning_strategy.unwrap_or(PlanningStrategyTag::DirectReactive),
                    max_steps: doc.max_steps.unwrap_or(30),
                    model_roles: doc.model_roles,
                    tool_names: doc.tool_names,
                    mcp_servers: doc.mcp_servers,
                    base_profile: doc.base_profile,
                    work_directory: doc.work_directory,
                });
            }
        }
        Ok(definitions)
    }
}

fn split_frontmatter(raw: &str) -> Option<(&str, &str)> {
    let rest = raw.strip_prefix("---\n")?;
    let end = rest.find("\n---")?;
    let frontmatter = &rest[..end];
    let body = &rest[end + 4..];
    Some((frontmatter, body))
}

/// Aggregates definitions from every configured source into one lookup keyed
/// by `agent_id`. Later sources override earlier ones by id.
#[derive(Default)]
pub struct DefinitionRegistry {
    definitions: HashMap<String, AgentDefinition>,
}

impl DefinitionRegistry {
    pub async fn merge(sources: &[Arc<dyn DefinitionSource>]) -> Result<Self> {
        let mut registry = Self::default();
        for source in sources {
            for definition in source.load().await? {
                registry.definitions.insert(definition.agent_id.clone(), definition);
            }
        }
        Ok(registry)
    }

    pub fn get(&self, agent_id: &str) -> Option<&AgentDefinition> {
        self.definitions.get(agent_id)
    }

    /// Resolves a sub-agent spawn target: tries an exact `agent_id` match
    /// first, then falls back to the first definition tagged with this
    /// specialist tag (spec.md §4.10's "registered specialist tag, or a
    /// fully custom agent id").
    pub fn find(&self, specialist_tag_or_id: &str) -> Option<&AgentDefinition> {
        self.definitions.get(specialist_tag_or_id).or_else(|| {
            self.definitions
                .values()
                .find(|d| d.specialist_tag.as_deref() == Some(specialist_tag_or_id))
        })
    }

    pub fn validate(&self, tool_registry: &ToolRegistry, known_specialists: &[String]) -> Result<()> {
        for definition in self.definitions.values() {
            let unregistered = tool_registry.unregistered(&definition.tool_names);
            if !unregistered.is_empty() {
                return Err(MeridianError::Internal(anyhow::anyhow!(
                    "agent {} references unregistered tools: {}",
                    definition.agent_id,
                    unregistered.join(", ")
                )));
            }
            if let Some(tag) = &definition.specialist_tag {
                if !known_specialists.iter().any(|s| s == tag) {
                    return Err(MeridianError::Internal(anyhow::anyhow!(
                        "agent {} references unknown specialist tag: {tag}",
                        definition.agent_id
                    )));
                }
            }
        }
        Ok(())
    }
}

/// An agent ready to `execute`: the wired loop plus its chosen strategy.
pub struct BuiltAgent {
    pub agent_loop: AgentLoop,
    pub strategy: Box<dyn PlanningStrategy>,
}

/// Given a definition and the shared runtime dependencies, builds an agent:
/// resolves tool names (validated in `DefinitionRegistry::validate` ahead of
/// time), instantiates the selected strategy, and wires the state store,
/// tool executor and event sink (spec.md §4.14).
pub struct AgentFactory {
    pub state_store: Arc<dyn StateStore>,
    pub llm_provider: Arc<dyn LlmProvider>,
    pub tool_executor: Arc<ToolExecutor>,
    pub event_sink: Arc<dyn EventSink>,
}

impl AgentFactory {
    pub fn build(&self, definition: &AgentDefinition) -> BuiltAgent {
        let model = definition
            .model_roles
            .get("primary")
            .cloned()
            .unwrap_or_else(|| "default".to_string());
        let reflection_model = definition.model_roles.get("reflection").cloned();

        let mut config = LoopConfig::new(definition.agent_id.clone(), model, definition.system_prompt.clone());
        config.max_steps = definition.max_steps;
        config.reflection_model = reflection_model;

        let strategy: Box<dyn PlanningStrategy> = match definition.planning_strategy {
            PlanningStrategyTag::DirectReactive => Box::new(DirectReactive),
            PlanningStrategyTag::PlanThenExecute => Box::new(PlanThenExecute),
            PlanningStrategyTag::InterleavedPlanAndAct => Box::new(InterleavedPlanAndAct),
            PlanningStrategyTag::SensePlanActReflect => Box::new(SensePlanActReflect::default()),
        };

        let agent_loop = AgentLoop::new(
            self.state_store.clone(),
            self.llm_provider.clone(),
            self.tool_executor.clone(),
            self.event_sink.clone(),
            config,
        );

        BuiltAgent { agent_loop, strategy }
    }
}
