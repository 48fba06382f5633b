// Approval policy for tools that declare `requires_approval` (spec.md §4.5 step 3,
// SPEC_FULL.md §4.20).

use std::sync::Arc;

use async_trait::async_trait;

use meridian_contracts::{IdentityContext, ToolCallRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approved,
    Denied { reason: String },
}

impl ApprovalDecision {
    pub fn is_approved(&self) -> bool {
        matches!(self, ApprovalDecision::Approved)
    }
}

#[async_trait]
pub trait ApprovalPolicy: Send + Sync {
    async fn decide(&self, call: &ToolCallRequest, identity: &IdentityContext) -> ApprovalDecision;
}

/// Approves every request. The default when no policy is attached.
pub struct AutoApprove;

#[async_trait]
impl ApprovalPolicy for AutoApprove {
    async fn decide(&self, _call: &ToolCallRequest, _identity: &IdentityContext) -> ApprovalDecision {
        ApprovalDecision::Approved
    }
}

/// Denies every request; useful for read-only profiles.
pub struct AlwaysDeny;

#[async_trait]
impl ApprovalPolicy for AlwaysDeny {
    async fn decide(&self, call: &ToolCallRequest, _identity: &IdentityContext) -> ApprovalDecision {
        ApprovalDecision::Denied {
            reason: format!("tool {} requires approval, policy denies all", call.name),
        }
    }
}

/// Delegates the decision to a caller-supplied predicate, e.g. one backed by
/// a human-in-the-loop channel or an external policy service.
pub struct CallbackApproval {
    callback: Arc<dyn Fn(&ToolCallRequest, &IdentityContext) -> bool + Send + Sync>,
}

impl CallbackApproval {
    pub fn new(
        callback: impl Fn(&ToolCallRequest, &IdentityContext) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            callback: Arc::new(callback),
        }
    }
}

#[async_trait]
impl ApprovalPolicy for CallbackApproval {
    async fn decide(&self, call: &ToolCallRequest, identity: &IdentityContext) -> ApprovalDecision {
        if (self.callback)(call, identity) {
            ApprovalDecision::Approved
        } else {
            ApprovalDecision::Denied {
                reason: format!("caller denied approval for tool {}", call.name),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn always_deny_denies_everything() {
        let policy = AlwaysDeny;
        let call = ToolCallRequest::new("c1", "shell", serde_json::json!({}));
        let identity = IdentityContext::anonymous();
        assert!(!policy.decide(&call, &identity).await.is_approved());
    }

    #[tokio::test]
    async fn callback_approval_delegates() {
        let policy = CallbackApproval::new(|call, _| call.name == "read_file");
        let identity = IdentityContext::anonymous();
        let allowed = ToolCallRequest::new("c1", "read_file", serde_json::json!({}));
        let denied = ToolCallRequest::new("c2", "shell", serde_json::json!({}));
        assert!(policy.decide(&allowed, &identity).await.is_approved());
        assert!(!policy.decide(&denied, &identity).await.is_approved());
    }
}
