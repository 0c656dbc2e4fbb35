//! Operator capability interface.
//!
//! The core never sees concrete operators; it only drives this trait.
//! An operator's textual name includes its parameters (for example
//! `read_file(main.py)`), which is what appears in the transition log and
//! the action-count table.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::goal::Goal;
use super::state::EditorState;

/// Result of executing an operator. A missing `new_state` means the
/// operator left the environment untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorResult {
    pub success: bool,
    pub new_state: Option<EditorState>,
    pub output: String,
    pub error: Option<String>,
}

impl OperatorResult {
    pub fn succeeded(new_state: EditorState, output: impl Into<String>) -> Self {
        Self {
            success: true,
            new_state: Some(new_state),
            output: output.into(),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            new_state: None,
            output: String::new(),
            error: Some(error.into()),
        }
    }
}

/// A discrete action with an applicability predicate and an execution that
/// yields a successor state or an error.
#[async_trait]
pub trait Operator: Send + Sync {
    /// Stable textual name, parameters included.
    fn name(&self) -> &str;

    fn is_destructive(&self) -> bool {
        false
    }

    /// Parameter bag, keyed with an `"op"` discriminant so the operator can
    /// be re-materialized from a chunk or an LLM suggestion.
    fn params(&self) -> serde_json::Value;

    /// Can this operator be applied in the current state?
    fn is_applicable(&self, state: &EditorState, goal: &Goal) -> bool;

    async fn execute(&self, state: &EditorState) -> OperatorResult;
}

pub type SharedOperator = Arc<dyn Operator>;
