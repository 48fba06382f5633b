// Error taxonomy shared across the workspace (spec.md §7).

use thiserror::Error;

/// Result type alias used by every Meridian crate.
pub type Result<T> = std::result::Result<T, MeridianError>;

/// The full error taxonomy. Tool-level and LLM-transient errors never reach
/// here directly — they are caught and turned into observations or retried
/// by the components that own them; this enum is what finally propagates to
/// `ExecutionResult::status = failed` or an API response.
#[derive(Debug, Error)]
pub enum MeridianError {
    /// Token cap reached despite sanitization and truncation.
    #[error("token budget exceeded")]
    BudgetExceeded,

    /// Repeated optimistic-concurrency conflicts on state save beyond the retry budget.
    #[error("persistence conflict after retries for session {0}")]
    PersistenceConflict(String),

    /// Single-shot optimistic-concurrency conflict, retryable by the caller.
    #[error("version conflict: expected {expected}, found {found}")]
    VersionConflict { expected: u64, found: u64 },

    /// Tool-result store miss.
    #[error("handle not found: {0}")]
    HandleNotFound(String),

    /// Tool name did not resolve in the registry.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// Tool call parameters failed schema validation.
    #[error("parameter validation failed for tool {tool}: {reason}")]
    ParamValidation { tool: String, reason: String },

    /// Approval policy denied a tool call.
    #[error("tool call not approved: {0}")]
    NotApproved(String),

    /// Tool dispatch exceeded its timeout.
    #[error("tool timed out: {0}")]
    ToolTimeout(String),

    /// Tool raised an error during execution.
    #[error("tool failed: {0}")]
    ToolFailure(String),

    /// Restart detected a non-idempotent tool call stuck mid-dispatch.
    #[error("partial recovery: tool call {0} has no observation and is not idempotent")]
    PartialRecovery(String),

    /// Step budget exhausted.
    #[error("max steps ({0}) reached")]
    MaxStepsReached(usize),

    /// External cancellation signal observed.
    #[error("execution cancelled")]
    Cancelled,

    /// Bounded message bus refused a publish under the drop policy.
    #[error("bus overflow on topic {0}")]
    BusOverflow(String),

    /// Judge reply could not be parsed into a decision; never terminal on its own.
    #[error("judge reply unparseable: {0}")]
    JudgeUnparseable(String),

    /// Inbound resume payload failed schema validation.
    #[error("resume validation failed: {0}")]
    ResumeValidation(String),

    /// Nesting depth cap exceeded on sub-agent spawn.
    #[error("max sub-agent nesting depth ({0}) exceeded")]
    MaxNestingDepth(usize),

    /// Any uncaught error.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl MeridianError {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MeridianError::BudgetExceeded
                | MeridianError::PersistenceConflict(_)
                | MeridianError::MaxStepsReached(_)
                | MeridianError::Cancelled
                | MeridianError::Internal(_)
                | MeridianError::MaxNestingDepth(_)
        )
    }

    /// The typed "kind" string used on `StreamEvent::Error` and HTTP bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            MeridianError::BudgetExceeded => "BudgetExceeded",
            MeridianError::PersistenceConflict(_) => "PersistenceConflict",
            MeridianError::VersionConflict { .. } => "VersionConflict",
            MeridianError::HandleNotFound(_) => "HandleNotFound",
            MeridianError::UnknownTool(_) => "UnknownTool",
            MeridianError::ParamValidation { .. } => "ParamValidation",
            MeridianError::NotApproved(_) => "NotApproved",
            MeridianError::ToolTimeout(_) => "ToolTimeout",
            MeridianError::ToolFailure(_) => "ToolFailure",
            MeridianError::PartialRecovery(_) => "PartialRecovery",
            MeridianError::MaxStepsReached(_) => "MaxStepsReached",
            MeridianError::Cancelled => "Cancelled",
            MeridianError::BusOverflow(_) => "BusOverflow",
            MeridianError::JudgeUnparseable(_) => "JudgeUnparseable",
            MeridianError::ResumeValidation(_) => "ResumeValidation",
            MeridianError::MaxNestingDepth(_) => "MaxNestingDepth",
            MeridianError::Internal(_) => "Internal",
        }
    }
}
