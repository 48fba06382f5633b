// Shared data model for Meridian
//
// This crate has no dependency on any other crate in the workspace. It
// defines the entities of the data model (sessions, messages, plans,
// execution results, stream events, epic runs/tasks, workflow checkpoints)
// and the error taxonomy shared by every other crate.

pub mod epic;
pub mod error;
pub mod event;
pub mod execution;
pub mod identity;
pub mod message;
pub mod plan;
pub mod registry;
pub mod session;
pub mod tool;
pub mod workflow;

pub use epic::{EpicRun, EpicTask, EpicTaskStatus, JudgeDecision, RoundRecord};
pub use error::{MeridianError, Result};
pub use event::{StreamEvent, StreamEventPayload};
pub use execution::{ExecutionResult, ExecutionStatus, TokenUsage};
pub use identity::IdentityContext;
pub use message::{ContentPart, Message, MessageContent, MessageRole};
pub use plan::{Plan, PlanError, PlanItem, PlanItemStatus};
pub use registry::{AgentDefinition, DefinitionSourceKind, PlanningStrategyTag};
pub use session::{Mission, PendingQuestion, Session, SessionId, SessionState};
pub use tool::{ToolCallRequest, ToolDefinition, ToolErrorKind, ToolResult};
pub use workflow::{
    BlockingReason, CheckpointRecord, HeartbeatRecord, LivenessTag, WorkflowCheckpoint,
    WorkflowStatus,
};
