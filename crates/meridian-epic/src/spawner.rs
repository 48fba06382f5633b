// Concrete SubAgentSpawner (spec.md §4.10): builds a child agent from the
// definition registry and drives it to a terminal `ExecutionResult`. The
// child's state lives under its own session id; the parent never touches it
// directly.

use std::sync::{Arc, OnceLock, Weak};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use meridian_contracts::{ExecutionResult, MeridianError};
use meridian_core::error::Result;
use meridian_core::spawner::DEFAULT_MAX_NESTING_DEPTH;
use meridian_core::{AgentFactory, DefinitionRegistry, SpawnRequest, SubAgentSpawner};

/// `call_agent` (`meridian_core::tools::CallAgentTool`) needs a spawner, and
/// the registered tool lives inside the `ToolRegistry` that `AgentFactory`
/// owns — so a spawner holding `Arc<AgentFactory>` directly would form a
/// permanent reference cycle (factory -> tool registry -> call_agent tool ->
/// spawner -> factory). `bind_factory` is called once, right after the
/// factory is constructed, to complete the link with a `Weak` reference
/// instead.
pub struct AgentLoopSpawner {
    registry: Arc<DefinitionRegistry>,
    factory: OnceLock<Weak<AgentFactory>>,
    max_nesting_depth: usize,
}

impl AgentLoopSpawner {
    pub fn new(registry: Arc<DefinitionRegistry>) -> Self {
        Self {
            registry,
            factory: OnceLock::new(),
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
        }
    }

    pub fn with_max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth;
        self
    }

    /// Binds the factory this spawner builds child agents from. Must be
    /// called exactly once, after the factory has been constructed; calling
    /// `spawn` before this returns `Internal`.
    pub fn bind_factory(&self, factory: &Arc<AgentFactory>) {
        let _ = self.factory.set(Arc::downgrade(factory));
    }
}

#[async_trait]
impl SubAgentSpawner for AgentLoopSpawner {
    fn max_nesting_depth(&self) -> usize {
        self.max_nesting_depth
    }

    async fn spawn(&self, request: SpawnRequest) -> Result<ExecutionResult> {
        self.check_nesting_depth(&request.parent_session_id)?;

        let factory = self
            .factory
            .get()
            .and_then(Weak::upgrade)
            .ok_or_else(|| MeridianError::Internal(anyhow::anyhow!("spawner used before bind_factory")))?;

        let definition = self.registry.find(&request.specialist_tag).cloned().ok_or_else(|| {
            MeridianError::Internal(anyhow::anyhow!(
                "no agent definition for specialist tag or id {}",
                request.specialist_tag
            ))
        })?;

        let built = factory.build(&definition);
        let child_session_id = request.parent_session_id.child(&request.specialist_tag);

        built
            .agent_loop
            .execute(
                request.mission,
                child_session_id,
                built.strategy.as_ref(),
                &request.identity,
                CancellationToken::new(),
            )
            .await
    }
}
