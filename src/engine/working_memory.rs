//! Working memory: transition history, action counts, loop detection.
//!
//! Lives for exactly one `solve` call. The action-count table is the tabu
//! memory behind the ACT-R history penalty; it is never decremented and
//! survives rollbacks so that a rollback cannot re-arm a loop.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::models::{EditorState, Goal, Operator, OperatorResult};

/// Ring-buffer bound on retained transitions.
const MAX_HISTORY: usize = 1000;

/// Consecutive same-operator failures that count as a loop.
const LOOP_WINDOW: usize = 3;

/// One recorded operator application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub timestamp: DateTime<Utc>,
    pub operator: String,
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
    pub from_hash: String,
    pub to_hash: String,
    pub goal_description: String,
    /// Snapshot the operator ran against; kept for rollback.
    pub previous_state: EditorState,
}

/// History of states and transitions for a single solve.
pub struct WorkingMemory {
    initial_state: EditorState,
    current_state: EditorState,
    history: VecDeque<StateTransition>,
    action_counts: HashMap<String, u32>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl WorkingMemory {
    pub fn new(initial_state: EditorState) -> Self {
        Self {
            current_state: initial_state.clone(),
            initial_state,
            history: VecDeque::new(),
            action_counts: HashMap::new(),
            last_timestamp: None,
        }
    }

    pub fn current_state(&self) -> &EditorState {
        &self.current_state
    }

    pub fn initial_state(&self) -> &EditorState {
        &self.initial_state
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn last_transition(&self) -> Option<&StateTransition> {
        self.history.back()
    }

    /// Record a transition and advance the current state. Also bumps the
    /// operator's action count. Timestamps are strictly increasing even
    /// when the clock does not move between calls.
    pub fn record_transition(
        &mut self,
        operator: &dyn Operator,
        result: &OperatorResult,
        new_state: EditorState,
        goal: &Goal,
    ) {
        let timestamp = self.next_timestamp();
        let transition = StateTransition {
            timestamp,
            operator: operator.name().to_string(),
            success: result.success,
            output: result.output.clone(),
            error: result.error.clone(),
            from_hash: self.current_state.content_hash(),
            to_hash: new_state.content_hash(),
            goal_description: goal.description.clone(),
            previous_state: self.current_state.clone(),
        };

        if self.history.len() >= MAX_HISTORY {
            self.history.pop_front();
        }
        self.history.push_back(transition);
        *self
            .action_counts
            .entry(operator.name().to_string())
            .or_insert(0) += 1;
        self.current_state = new_state;
    }

    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.last_timestamp {
            if now <= last {
                now = last + Duration::microseconds(1);
            }
        }
        self.last_timestamp = Some(now);
        now
    }

    /// Times this operator has been applied during the current solve.
    pub fn action_count(&self, operator_name: &str) -> u32 {
        self.action_counts.get(operator_name).copied().unwrap_or(0)
    }

    /// True when the last three transitions share one operator name and all
    /// of them failed.
    pub fn has_loop(&self) -> bool {
        if self.history.len() < LOOP_WINDOW {
            return false;
        }
        let recent: Vec<&StateTransition> =
            self.history.iter().rev().take(LOOP_WINDOW).collect();
        let name = &recent[0].operator;
        recent.iter().all(|t| &t.operator == name && !t.success)
    }

    pub fn recent_transitions(&self, n: usize) -> Vec<&StateTransition> {
        let skip = self.history.len().saturating_sub(n);
        self.history.iter().skip(skip).collect()
    }

    pub fn failed_operators(&self, window: usize) -> Vec<String> {
        self.recent_transitions(window)
            .into_iter()
            .filter(|t| !t.success)
            .map(|t| t.operator.clone())
            .collect()
    }

    /// Append an error to the current state without recording a
    /// transition; how the agent surfaces engine-level failures.
    pub fn annotate_error(&mut self, error: impl Into<String>) {
        self.current_state.push_error(error);
    }

    /// Revert the current state to the snapshot from `steps` transitions
    /// ago, never past the initial state. Action counts are deliberately
    /// left untouched.
    pub fn rollback(&mut self, steps: usize) -> EditorState {
        let state = if steps == 0 {
            self.current_state.clone()
        } else if steps > self.history.len() {
            self.initial_state.clone()
        } else {
            let idx = self.history.len() - steps;
            self.history[idx].previous_state.clone()
        };
        self.current_state = state.clone();
        state
    }

    /// Human-readable trace of every transition so far.
    pub fn trace(&self) -> String {
        let mut lines = vec![format!(
            "Initial state: {}",
            self.initial_state.working_directory
        )];
        for (i, t) in self.history.iter().enumerate() {
            let mark = if t.success { "ok" } else { "FAIL" };
            lines.push(format!("{}. [{}] {}", i + 1, mark, t.operator));
            if !t.output.is_empty() {
                lines.push(format!("   {}", t.output));
            }
            if let Some(error) = &t.error {
                lines.push(format!("   error: {error}"));
            }
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::OperatorResult;
    use async_trait::async_trait;

    struct FakeOp {
        name: String,
    }

    #[async_trait]
    impl Operator for FakeOp {
        fn name(&self) -> &str {
            &self.name
        }

        fn params(&self) -> serde_json::Value {
            serde_json::json!({ "op": "fake" })
        }

        fn is_applicable(&self, _state: &EditorState, _goal: &Goal) -> bool {
            true
        }

        async fn execute(&self, state: &EditorState) -> OperatorResult {
            OperatorResult::succeeded(state.clone(), "noop")
        }
    }

    fn record(wm: &mut WorkingMemory, name: &str, success: bool) {
        let op = FakeOp { name: name.to_string() };
        let result = OperatorResult {
            success,
            new_state: Some(wm.current_state().clone()),
            output: String::new(),
            error: if success { None } else { Some("boom".to_string()) },
        };
        let goal = Goal::new("test goal");
        let new_state = wm.current_state().clone();
        wm.record_transition(&op, &result, new_state, &goal);
    }

    #[test]
    fn action_count_equals_number_of_applications() {
        let mut wm = WorkingMemory::new(EditorState::new("/p"));
        for _ in 0..4 {
            record(&mut wm, "read_file(a.py)", true);
        }
        assert_eq!(wm.action_count("read_file(a.py)"), 4);
        assert_eq!(wm.action_count("list_dir(.)"), 0);
    }

    #[test]
    fn loop_needs_three_consecutive_failures_of_one_operator() {
        let mut wm = WorkingMemory::new(EditorState::new("/p"));
        record(&mut wm, "read_file(a.py)", false);
        record(&mut wm, "read_file(a.py)", false);
        assert!(!wm.has_loop());

        record(&mut wm, "read_file(a.py)", false);
        assert!(wm.has_loop());

        record(&mut wm, "list_dir(.)", true);
        assert!(!wm.has_loop());
    }

    #[test]
    fn mixed_failures_are_not_a_loop() {
        let mut wm = WorkingMemory::new(EditorState::new("/p"));
        record(&mut wm, "read_file(a.py)", false);
        record(&mut wm, "list_dir(.)", false);
        record(&mut wm, "read_file(a.py)", false);
        assert!(!wm.has_loop());
    }

    #[test]
    fn rollback_never_passes_initial_state_and_keeps_counts() {
        let mut wm = WorkingMemory::new(EditorState::new("/p"));
        record(&mut wm, "read_file(a.py)", true);
        record(&mut wm, "read_file(a.py)", true);

        let state = wm.rollback(100);
        assert_eq!(state.working_directory, "/p");
        assert_eq!(wm.action_count("read_file(a.py)"), 2);
    }

    #[test]
    fn transition_timestamps_are_strictly_increasing() {
        let mut wm = WorkingMemory::new(EditorState::new("/p"));
        for _ in 0..5 {
            record(&mut wm, "read_file(a.py)", true);
        }
        let stamps: Vec<_> = wm.recent_transitions(5).iter().map(|t| t.timestamp).collect();
        for pair in stamps.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn trace_mentions_every_operator() {
        let mut wm = WorkingMemory::new(EditorState::new("/p"));
        record(&mut wm, "read_file(a.py)", true);
        record(&mut wm, "list_dir(.)", false);

        let trace = wm.trace();
        assert!(trace.contains("read_file(a.py)"));
        assert!(trace.contains("list_dir(.)"));
        assert!(trace.contains("FAIL"));
    }
}
