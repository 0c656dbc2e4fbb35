//! Goal model and the arena-backed goal stack.
//!
//! Goals form a tree; parent back-references are relational, never
//! ownership. The arena owns every node, the stack holds ids, and the top
//! of the stack is the current goal.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Active,
    Success,
    Failure,
}

impl Default for GoalStatus {
    fn default() -> Self {
        Self::Active
    }
}

impl GoalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

/// A goal or sub-goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: Uuid,
    pub description: String,
    pub parent: Option<Uuid>,
    pub sub_goals: Vec<Uuid>,
    pub status: GoalStatus,
    pub priority: f64,
}

impl Goal {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            parent: None,
            sub_goals: Vec::new(),
            status: GoalStatus::Active,
            priority: 1.0,
        }
    }

    pub fn with_priority(mut self, priority: f64) -> Self {
        self.priority = priority;
        self
    }
}

/// Arena of goal nodes plus the active stack. The root is pushed at
/// construction and is never popped; `current` is always valid while a
/// solve is running.
#[derive(Debug)]
pub struct GoalArena {
    nodes: HashMap<Uuid, Goal>,
    stack: Vec<Uuid>,
}

impl GoalArena {
    pub fn new(root: Goal) -> Self {
        let root_id = root.id;
        let mut nodes = HashMap::new();
        nodes.insert(root_id, root);
        Self {
            nodes,
            stack: vec![root_id],
        }
    }

    pub fn root_id(&self) -> Uuid {
        self.stack[0]
    }

    pub fn root(&self) -> &Goal {
        &self.nodes[&self.stack[0]]
    }

    pub fn current_id(&self) -> Uuid {
        *self.stack.last().expect("goal stack is never empty")
    }

    pub fn current(&self) -> &Goal {
        &self.nodes[&self.current_id()]
    }

    pub fn get(&self, id: Uuid) -> Option<&Goal> {
        self.nodes.get(&id)
    }

    pub fn depth_of_current(&self) -> usize {
        self.stack.len() - 1
    }

    pub fn stack_height(&self) -> usize {
        self.stack.len()
    }

    /// Push a sub-goal of the current goal and make it current.
    pub fn push_child(&mut self, description: impl Into<String>) -> Uuid {
        let parent_id = self.current_id();
        let parent_priority = self.nodes[&parent_id].priority;
        let mut child = Goal::new(description).with_priority(parent_priority + 0.1);
        child.parent = Some(parent_id);
        let child_id = child.id;
        self.nodes.insert(child_id, child);
        self.nodes
            .get_mut(&parent_id)
            .expect("parent exists")
            .sub_goals
            .push(child_id);
        self.stack.push(child_id);
        child_id
    }

    /// Seal the current sub-goal with `status` and pop it. The root is
    /// never popped; returns the popped id, or `None` when at the root.
    pub fn pop(&mut self, status: GoalStatus) -> Option<Uuid> {
        if self.stack.len() <= 1 {
            return None;
        }
        let popped = self.stack.pop().expect("checked above");
        if let Some(goal) = self.nodes.get_mut(&popped) {
            goal.status = status;
        }
        Some(popped)
    }

    pub fn set_status(&mut self, id: Uuid, status: GoalStatus) {
        if let Some(goal) = self.nodes.get_mut(&id) {
            goal.status = status;
        }
    }
}
