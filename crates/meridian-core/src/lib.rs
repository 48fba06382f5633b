// Agent runtime: the loop, planning strategies, tool dispatch and budgeting.
//
// This crate depends only on `meridian-contracts`. It defines the traits
// (`StateStore`, `ToolResultStore`, `EventSink`, `LlmProvider`) that bind it
// to storage, buses and providers, without depending on any of them — those
// crates depend back on `meridian-core` to implement its traits.

pub mod approval;
pub mod budget;
pub mod bus;
pub mod context;
pub mod error;
pub mod factory;
pub mod history;
pub mod loop_engine;
pub mod planner_tool;
pub mod spawner;
pub mod strategies;
pub mod tool_executor;
pub mod tool_registry;
pub mod traits;
pub mod tools;

pub use approval::{ApprovalDecision, ApprovalPolicy, AlwaysDeny, AutoApprove, CallbackApproval};
pub use budget::{BudgetDecision, TokenBudgeter};
pub use bus::{BusMessage, BusSubscription, MessageBus, OverflowPolicy};
pub use context::ContextBuilder;
pub use error::{CoreError, Result};
pub use factory::{
    AgentFactory, BuiltAgent, ConfigFileSource, DefinitionRegistry, DefinitionSource,
    PluginManifestSource, SlashCommandSource, UserOverrideSource,
};
pub use history::MessageHistoryManager;
pub use loop_engine::{AgentLoop, LoopConfig, LoopOutcome, LoopState};
pub use planner_tool::PlannerTool;
pub use spawner::{SpawnRequest, SubAgentSpawner};
pub use strategies::{PlanningStrategy, StrategyAction};
pub use tool_executor::{ToolExecutionResult, ToolExecutor, ToolInternalError};
pub use tool_registry::{Tool, ToolRegistry};
pub use traits::{
    CheckpointStore, EventSink, HeartbeatStore, LlmProvider, LlmResponse, StateStore,
    ToolResultStore, WorkflowCheckpointStore,
};
