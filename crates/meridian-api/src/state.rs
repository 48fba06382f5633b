// Shared application state (spec.md §6): one `ExecutorService` per process,
// wired from a `RuntimeProfile` at startup.

use std::sync::Arc;

use meridian_core::{DefinitionRegistry, MessageBus, WorkflowCheckpointStore};
use meridian_service::{ExecutorService, RuntimeProfile, SessionsService};
use meridian_workflow::ResumableWorkflowRuntime;

#[derive(Clone)]
pub struct AppState {
    pub executor: Arc<ExecutorService>,
    pub sessions: Arc<SessionsService>,
    pub workflows: Arc<ResumableWorkflowRuntime>,
    pub checkpoints: Arc<dyn WorkflowCheckpointStore>,
    pub registry: Arc<DefinitionRegistry>,
    pub bus: Arc<dyn MessageBus>,
    pub runtime: Arc<RuntimeProfile>,
}
