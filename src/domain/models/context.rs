//! Persisted goal frames (context nodes).
//!
//! Every push onto the goal stack persists a context node; popping seals it
//! with the outcome and, when known, the operator that resolved it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextStatus {
    Active,
    Success,
    Failure,
}

impl ContextStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextNode {
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    pub goal_description: String,
    pub state_snapshot: String,
    pub status: ContextStatus,
    pub created_at: DateTime<Utc>,
    pub depth: usize,
    #[serde(default)]
    pub resolution_operator: Option<String>,
    #[serde(default)]
    pub resolution_reasoning: Option<String>,
}

impl ContextNode {
    pub fn new(
        goal_description: impl Into<String>,
        state_snapshot: impl Into<String>,
        parent_id: Option<Uuid>,
        depth: usize,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            parent_id,
            goal_description: goal_description.into(),
            state_snapshot: state_snapshot.into(),
            status: ContextStatus::Active,
            created_at: Utc::now(),
            depth,
            resolution_operator: None,
            resolution_reasoning: None,
        }
    }

    pub fn seal(
        &mut self,
        status: ContextStatus,
        resolution_operator: Option<String>,
        resolution_reasoning: Option<String>,
    ) {
        self.status = status;
        self.resolution_operator = resolution_operator;
        self.resolution_reasoning = resolution_reasoning;
    }
}
