//! Cognitive-load indicators fed to the meta-cognitive monitor.

/// Snapshot of the signals that drive the pressure calculation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CognitiveMetrics {
    /// Sub-goal nesting depth of the current goal.
    pub goal_depth: usize,
    /// Milliseconds spent in the current state.
    pub time_in_state_ms: f64,
    /// Total impasses encountered this solve.
    pub impasse_count: u32,
    /// 0.0 = clear winner, 1.0 = no options or all equal.
    pub operator_ambiguity: f64,
}
