// Meridian API server (spec.md §6): thin HTTP edge over `ExecutorService`.

mod common;
mod execute;
mod sessions;
mod state;
mod workflows;

use std::sync::Arc;

use anyhow::{Context, Result};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use meridian_anthropic::AnthropicProvider;
use meridian_core::{
    AgentFactory, ConfigFileSource, DefinitionRegistry, DefinitionSource, PluginManifestSource,
    SlashCommandSource, ToolExecutor, ToolRegistry,
};
use meridian_epic::AgentLoopSpawner;
use meridian_openai::OpenAiProvider;
use meridian_service::{ExecutorService, RuntimeProfile, SessionsService};
use meridian_storage::{FileStateStore, InMemoryCheckpointStore, InMemoryToolResultStore};
use meridian_workflow::ResumableWorkflowRuntime;

use crate::state::AppState;
use crate::workflows::{BusCommunicationGateway, BusWorkflowEngine};

#[derive(OpenApi)]
#[openapi(
    paths(
        execute::execute,
        execute::execute_stream,
        sessions::list_sessions,
        sessions::get_session,
        sessions::delete_session,
        workflows::create_wait,
        workflows::latest_checkpoint,
        workflows::resume,
        workflows::resume_and_continue,
    ),
    components(schemas(
        meridian_contracts::Mission,
        meridian_contracts::SessionId,
        meridian_contracts::Session,
        meridian_contracts::ExecutionStatus,
        meridian_contracts::TokenUsage,
        meridian_contracts::ExecutionResult,
        meridian_contracts::StreamEvent,
        meridian_contracts::StreamEventPayload,
        meridian_contracts::ToolCallRequest,
        execute::ExecuteRequest,
        workflows::WaitRequest,
        workflows::WaitResponse,
        workflows::ResumeRequest,
        workflows::ResumeAndContinueRequest,
        workflows::ResumeResponse,
    )),
    tags(
        (name = "execute", description = "Mission execution endpoints"),
        (name = "sessions", description = "Session inspection endpoints"),
        (name = "workflows", description = "Resumable workflow wait-gate endpoints"),
    ),
    info(
        title = "Meridian API",
        version = "0.1.0",
        description = "HTTP API for the Meridian multi-agent orchestration runtime",
    )
)]
struct ApiDoc;

fn build_llm_provider() -> Result<Arc<dyn meridian_core::LlmProvider>> {
    if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
        return Ok(Arc::new(AnthropicProvider::new(key)));
    }
    let key = std::env::var("OPENAI_API_KEY").context(
        "either ANTHROPIC_API_KEY or OPENAI_API_KEY must be set to select an LLM provider",
    )?;
    Ok(Arc::new(OpenAiProvider::new(key)))
}

async fn definition_sources(runtime: &RuntimeProfile) -> Vec<Arc<dyn DefinitionSource>> {
    let mut sources: Vec<Arc<dyn DefinitionSource>> = Vec::new();
    if let Some(dir) = &runtime.config_dir {
        sources.push(Arc::new(ConfigFileSource { path: dir.join("agents.toml") }));
    }
    if let Some(dir) = &runtime.plugin_dir {
        sources.push(Arc::new(PluginManifestSource { directory: dir.clone() }));
    }
    if let Some(dir) = &runtime.slash_command_dir {
        sources.push(Arc::new(SlashCommandSource { directory: dir.clone() }));
    }
    sources
}

fn default_agent_definition(agent_id: &str) -> meridian_contracts::AgentDefinition {
    meridian_contracts::AgentDefinition {
        agent_id: agent_id.to_string(),
        name: "Default Agent".to_string(),
        source: meridian_contracts::DefinitionSourceKind::UserOverride,
        mutable: true,
        system_prompt: "You are a capable, careful general-purpose assistant.".to_string(),
        specialist_tag: None,
        planning_strategy: meridian_contracts::PlanningStrategyTag::DirectReactive,
        max_steps: 30,
        model_roles: [("primary".to_string(), "default".to_string())].into_iter().collect(),
        tool_names: vec![
            "echo".to_string(),
            "get_current_time".to_string(),
            "ask_user".to_string(),
            "call_agent".to_string(),
        ],
        mcp_servers: Vec::new(),
        base_profile: None,
        work_directory: None,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "meridian_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let runtime = Arc::new(RuntimeProfile::load());
    tracing::info!(bind_addr = %runtime.bind_addr, auto_epic = runtime.auto_epic, "meridian-api starting");

    let state_store = Arc::new(
        FileStateStore::new(runtime.state_dir.clone())
            .await
            .context("failed to initialize state store")?,
    );
    let tool_result_store = Arc::new(InMemoryToolResultStore::new());
    let checkpoint_store = Arc::new(InMemoryCheckpointStore::new());
    let workflow_checkpoints = Arc::new(meridian_workflow::InMemoryWorkflowCheckpointStore::new());
    let bus: Arc<dyn meridian_core::MessageBus> = Arc::new(meridian_bus::InProcessMessageBus::new());

    let llm_provider = build_llm_provider()?;

    let mut sources = definition_sources(&runtime).await;
    sources.push(Arc::new(meridian_core::UserOverrideSource {
        definitions: vec![default_agent_definition(&runtime.default_agent_id)],
    }));
    let registry = Arc::new(
        DefinitionRegistry::merge(&sources)
            .await
            .context("failed to load agent definitions")?,
    );

    let event_sink: Arc<dyn meridian_core::EventSink> =
        Arc::new(meridian_service::BusEventSink::new(bus.clone()));

    // `call_agent` closes the loop back through the spawner, and the spawner
    // closes it back through the factory that owns this very tool registry
    // (see the comment on `AgentLoopSpawner`) — build the spawner first with
    // its factory link unbound, then bind it once the factory exists.
    let spawner = Arc::new(
        AgentLoopSpawner::new(registry.clone()).with_max_nesting_depth(runtime.nesting_depth_cap),
    );

    let mut tool_registry = ToolRegistry::new();
    tool_registry.register(Arc::new(meridian_core::tools::EchoTool));
    tool_registry.register(Arc::new(meridian_core::tools::GetCurrentTimeTool));
    tool_registry.register(Arc::new(meridian_core::tools::AskUserTool));
    tool_registry.register(Arc::new(meridian_core::tools::CallAgentTool::new(spawner.clone())));
    let tool_registry = Arc::new(tool_registry);
    let tool_executor = Arc::new(ToolExecutor::new(tool_registry.clone(), tool_result_store));

    if let Err(e) = registry.validate(&tool_registry, &[]) {
        tracing::warn!(error = %e, "agent definition validation failed; continuing with unvalidated registry");
    }

    let factory = Arc::new(AgentFactory {
        state_store: state_store.clone(),
        llm_provider,
        tool_executor,
        event_sink: event_sink.clone(),
    });
    spawner.bind_factory(&factory);

    let executor = Arc::new(ExecutorService::new(
        registry.clone(),
        factory.clone(),
        bus.clone(),
        spawner,
        checkpoint_store,
    ));
    let sessions_service = Arc::new(SessionsService::new(state_store));

    let gateway = Arc::new(BusCommunicationGateway::new(event_sink.clone()));
    let engine = Arc::new(BusWorkflowEngine::new(event_sink));
    let workflows = Arc::new(ResumableWorkflowRuntime::new(
        workflow_checkpoints.clone(),
        gateway,
        engine,
    ));

    let app_state = AppState {
        executor,
        sessions: sessions_service,
        workflows,
        checkpoints: workflow_checkpoints,
        registry,
        bus,
        runtime: runtime.clone(),
    };

    let app = axum::Router::new()
        .merge(execute::routes(app_state.clone()))
        .merge(sessions::routes(app_state.clone()))
        .merge(workflows::routes(app_state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&runtime.bind_addr)
        .await
        .context("failed to bind to address")?;
    tracing::info!(bind_addr = %runtime.bind_addr, "listening");

    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
