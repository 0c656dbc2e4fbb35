//! Meta-cognitive pressure monitor: the relief valve.
//!
//! Watches goal depth, time in state, and operator ambiguity, and decides
//! when to abandon symbolic subgoaling for the ACT-R heuristic or the
//! evolutionary solver.

use std::time::Instant;

use crate::domain::models::CognitiveMetrics;

use super::rule_engine::Proposal;

const DEPTH_WEIGHT: f64 = 0.4;
const TIME_WEIGHT: f64 = 0.3;
const AMBIGUITY_WEIGHT: f64 = 0.3;

/// Pressure at which the ACT-R resolver takes over.
pub const ACTR_THRESHOLD: f64 = 0.7;
/// Pressure at which the evolutionary solver is considered.
pub const EVOLUTION_THRESHOLD: f64 = 0.9;

/// Which resolution path the current pressure selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReliefPath {
    /// Stay symbolic: subgoal or proceed with the top operator.
    Symbolic,
    /// Hand the decision to the ACT-R utility resolver.
    ActR,
    /// Escalate to the evolutionary solver (code-fix goals only).
    Evolution,
}

pub struct MetaCognitiveMonitor {
    depth_threshold: u32,
    time_threshold_ms: f64,
    state_entered: Instant,
    total_impasses: u32,
}

impl MetaCognitiveMonitor {
    pub fn new(depth_threshold: u32, time_threshold_ms: f64) -> Self {
        Self {
            depth_threshold: depth_threshold.max(1),
            time_threshold_ms: time_threshold_ms.max(1.0),
            state_entered: Instant::now(),
            total_impasses: 0,
        }
    }

    /// Called by the agent whenever the state changes.
    pub fn reset_timer(&mut self) {
        self.state_entered = Instant::now();
    }

    pub fn increment_impasse_count(&mut self) {
        self.total_impasses += 1;
    }

    pub fn total_impasses(&self) -> u32 {
        self.total_impasses
    }

    pub fn time_in_state_ms(&self) -> f64 {
        self.state_entered.elapsed().as_secs_f64() * 1000.0
    }

    /// 0.0 for a single proposal, `1 - 1/n` for `n` tied top proposals,
    /// 1.0 for no proposals.
    pub fn operator_ambiguity(&self, proposals: &[Proposal]) -> f64 {
        if proposals.is_empty() {
            return 1.0;
        }
        if proposals.len() == 1 {
            return 0.0;
        }
        let top = proposals[0].priority;
        let tied = proposals
            .iter()
            .filter(|p| (p.priority - top).abs() < f64::EPSILON)
            .count();
        if tied <= 1 {
            0.0
        } else {
            1.0 - 1.0 / tied as f64
        }
    }

    /// Cognitive pressure in [0, 1]. A detected loop overrides the weighted
    /// sum and pins pressure at no less than 0.9.
    pub fn pressure(&self, metrics: &CognitiveMetrics, has_loop: bool) -> f64 {
        let depth = (metrics.goal_depth as f64 / f64::from(self.depth_threshold)).min(1.0);
        let time = (metrics.time_in_state_ms / self.time_threshold_ms).min(1.0);

        let mut pressure = DEPTH_WEIGHT * depth
            + TIME_WEIGHT * time
            + AMBIGUITY_WEIGHT * metrics.operator_ambiguity;

        if has_loop {
            pressure = pressure.max(EVOLUTION_THRESHOLD);
        }
        pressure.min(1.0)
    }

    /// Map pressure to a resolution path. Evolution is only selected for
    /// goals the caller classifies as code-fix goals.
    pub fn relief_path(&self, pressure: f64, is_code_fix_goal: bool) -> ReliefPath {
        if pressure < ACTR_THRESHOLD {
            ReliefPath::Symbolic
        } else if pressure < EVOLUTION_THRESHOLD || !is_code_fix_goal {
            ReliefPath::ActR
        } else {
            ReliefPath::Evolution
        }
    }

    /// One-line breakdown of the pressure components, for narration.
    pub fn summary(&self, metrics: &CognitiveMetrics, has_loop: bool) -> String {
        format!(
            "pressure={:.2} depth={}/{} time={:.0}ms ambiguity={:.2} impasses={} loop={}",
            self.pressure(metrics, has_loop),
            metrics.goal_depth,
            self.depth_threshold,
            metrics.time_in_state_ms,
            metrics.operator_ambiguity,
            metrics.impasse_count,
            has_loop,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::rule_engine::{Proposal, ProposalSource};
    use crate::operators::ReadFile;

    fn metrics(depth: usize, time_ms: f64, ambiguity: f64) -> CognitiveMetrics {
        CognitiveMetrics {
            goal_depth: depth,
            time_in_state_ms: time_ms,
            impasse_count: 0,
            operator_ambiguity: ambiguity,
        }
    }

    fn proposals_at(priorities: &[f64]) -> Vec<Proposal> {
        priorities
            .iter()
            .enumerate()
            .map(|(i, p)| Proposal {
                operator: ReadFile::shared(format!("f{i}.py")),
                priority: *p,
                reason: String::new(),
                source: ProposalSource::Rule("r".to_string()),
            })
            .collect()
    }

    #[test]
    fn two_way_tie_scores_expected_pressure() {
        let monitor = MetaCognitiveMonitor::new(3, 500.0);
        let m = metrics(0, 0.0, 0.5);
        let p = monitor.pressure(&m, false);
        assert!((p - 0.15).abs() < 1e-9);
    }

    #[test]
    fn pressure_saturates_at_thresholds() {
        let monitor = MetaCognitiveMonitor::new(3, 500.0);
        let m = metrics(30, 50_000.0, 1.0);
        let p = monitor.pressure(&m, false);
        assert!((p - 1.0).abs() < 1e-9);
    }

    #[test]
    fn loop_pins_pressure_at_point_nine() {
        let monitor = MetaCognitiveMonitor::new(3, 500.0);
        let m = metrics(0, 0.0, 0.0);
        assert!((monitor.pressure(&m, false) - 0.0).abs() < 1e-9);
        assert!(monitor.pressure(&m, true) >= 0.9);
    }

    #[test]
    fn pressure_is_non_decreasing_when_loop_appears() {
        let monitor = MetaCognitiveMonitor::new(3, 500.0);
        for ambiguity in [0.0, 0.5, 1.0] {
            let m = metrics(2, 400.0, ambiguity);
            assert!(monitor.pressure(&m, true) >= monitor.pressure(&m, false));
        }
    }

    #[test]
    fn ambiguity_follows_tied_top_count() {
        let monitor = MetaCognitiveMonitor::new(3, 500.0);
        assert!((monitor.operator_ambiguity(&[]) - 1.0).abs() < 1e-9);
        assert!((monitor.operator_ambiguity(&proposals_at(&[5.0])) - 0.0).abs() < 1e-9);
        assert!((monitor.operator_ambiguity(&proposals_at(&[5.0, 5.0])) - 0.5).abs() < 1e-9);
        assert!(
            (monitor.operator_ambiguity(&proposals_at(&[5.0, 5.0, 5.0, 5.0])) - 0.75).abs()
                < 1e-9
        );
        // Clear winner over a weaker option: no ambiguity.
        assert!((monitor.operator_ambiguity(&proposals_at(&[5.0, 3.0])) - 0.0).abs() < 1e-9);
    }

    #[test]
    fn relief_path_honors_thresholds_and_code_fix_gate() {
        let monitor = MetaCognitiveMonitor::new(3, 500.0);
        assert_eq!(monitor.relief_path(0.3, true), ReliefPath::Symbolic);
        assert_eq!(monitor.relief_path(0.75, true), ReliefPath::ActR);
        assert_eq!(monitor.relief_path(0.95, true), ReliefPath::Evolution);
        assert_eq!(monitor.relief_path(0.95, false), ReliefPath::ActR);
    }
}
