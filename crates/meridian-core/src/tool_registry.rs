// Tool registry: name -> instance + declared metadata (spec.md §4.15).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use meridian_contracts::{IdentityContext, SessionId, ToolDefinition};

use crate::tool_executor::ToolExecutionResult;

/// One callable tool. Implementations are function-style: stateless beyond
/// whatever they capture at construction (an HTTP client, a sub-agent
/// spawner, ...).
#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    async fn execute(
        &self,
        params: Value,
        session_id: &SessionId,
        identity: &IdentityContext,
    ) -> ToolExecutionResult;
}

/// Maps tool names to instances. Unknown names cause the factory to fail
/// before the agent is built (spec.md §4.15); at dispatch time an unknown
/// name produces a typed `UnknownTool` observation instead (spec.md §4.5).
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.definition().name.clone(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// Names referenced by an agent definition's tool list that are not
    /// registered here (spec.md §4.14 validation).
    pub fn unregistered<'a>(&self, names: &'a [String]) -> Vec<&'a str> {
        names
            .iter()
            .filter(|n| !self.contains(n))
            .map(|n| n.as_str())
            .collect()
    }
}
