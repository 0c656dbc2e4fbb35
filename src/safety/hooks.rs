//! Programmatic approval hooks.
//!
//! The interactive surface that would prompt a human lives outside this
//! crate; these hooks cover embedding, testing, and headless operation.

use async_trait::async_trait;

use crate::domain::ports::{ApprovalDecision, ApprovalHook, ApprovalRequest};

/// Approves everything. The default when no hook is injected.
pub struct AutoApproveHook;

#[async_trait]
impl ApprovalHook for AutoApproveHook {
    async fn request_approval(&self, _request: &ApprovalRequest) -> ApprovalDecision {
        ApprovalDecision::Approved
    }
}

/// Denies everything.
pub struct DenyAllHook;

#[async_trait]
impl ApprovalHook for DenyAllHook {
    async fn request_approval(&self, _request: &ApprovalRequest) -> ApprovalDecision {
        ApprovalDecision::Denied
    }
}

/// Returns a fixed decision.
pub struct StaticHook {
    decision: ApprovalDecision,
}

impl StaticHook {
    pub fn new(decision: ApprovalDecision) -> Self {
        Self { decision }
    }
}

#[async_trait]
impl ApprovalHook for StaticHook {
    async fn request_approval(&self, _request: &ApprovalRequest) -> ApprovalDecision {
        self.decision
    }
}
