//! Approval hook port used by the safety middleware.
//!
//! The hook is synchronous from the middleware's perspective but may
//! suspend the cooperative task (e.g. to prompt a human).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approved,
    Denied,
}

/// Everything a reviewer needs to judge an operator before it runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub operator_name: String,
    pub destructive: bool,
    pub utility: Option<f64>,
    pub reasoning: Option<String>,
    pub working_directory: String,
    pub recent_error: Option<String>,
}

#[async_trait]
pub trait ApprovalHook: Send + Sync {
    async fn request_approval(&self, request: &ApprovalRequest) -> ApprovalDecision;
}
