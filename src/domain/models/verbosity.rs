//! Narration levels for the agent's decision-cycle output.

use serde::{Deserialize, Serialize};

/// How much of its reasoning the agent narrates through `tracing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    /// Errors only.
    Silent = 0,
    /// Cycle headlines and operator outcomes.
    Basic = 1,
    /// Reasoning breakdowns (pressure, utilities, impasse handling).
    Thinking = 2,
    /// Full internal state.
    Debug = 3,
}

impl Default for Verbosity {
    fn default() -> Self {
        Self::Thinking
    }
}

impl Verbosity {
    pub fn at_least(&self, level: Verbosity) -> bool {
        *self >= level
    }
}
