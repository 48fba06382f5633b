// Sub-agent spawner (spec.md §4.10).

use async_trait::async_trait;

use meridian_contracts::{ExecutionResult, IdentityContext, Mission, SessionId};

use crate::error::Result;

pub const DEFAULT_MAX_NESTING_DEPTH: usize = 3;
pub const DEFAULT_SUMMARIZE_THRESHOLD_CHARS: usize = 4_000;

/// A request to spawn and run a child agent to completion.
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    pub parent_session_id: SessionId,
    /// A registered specialist tag, or a fully custom agent id.
    pub specialist_tag: String,
    pub mission: Mission,
    pub identity: IdentityContext,
}

/// Builds a child session id as `{parent}:sub_{tag}_{short-random}`, builds
/// the child agent via the factory, enforces the nesting-depth cap, and
/// drives it to terminal. The child's state is isolated: it cannot mutate
/// the parent's state, and the parent observes only the returned
/// `ExecutionResult`.
#[async_trait]
pub trait SubAgentSpawner: Send + Sync {
    async fn spawn(&self, request: SpawnRequest) -> Result<ExecutionResult>;

    fn max_nesting_depth(&self) -> usize {
        DEFAULT_MAX_NESTING_DEPTH
    }

    /// Reject a spawn before building anything if it would exceed the cap.
    fn check_nesting_depth(&self, parent_session_id: &SessionId) -> Result<()> {
        if parent_session_id.depth() + 1 > self.max_nesting_depth() {
            return Err(meridian_contracts::MeridianError::MaxNestingDepth(
                self.max_nesting_depth(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Capped;

    #[async_trait]
    impl SubAgentSpawner for Capped {
        async fn spawn(&self, _request: SpawnRequest) -> Result<ExecutionResult> {
            unreachable!()
        }

        fn max_nesting_depth(&self) -> usize {
            1
        }
    }

    #[test]
    fn rejects_spawn_beyond_nesting_cap() {
        let spawner = Capped;
        let root = SessionId::new_root();
        let child = root.child("a");
        assert!(spawner.check_nesting_depth(&root).is_ok());
        assert!(spawner.check_nesting_depth(&child).is_err());
    }
}
