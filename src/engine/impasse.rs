//! Impasse detection over an ordered proposal list.

use crate::domain::models::{EditorState, Goal};

use super::rule_engine::Proposal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImpasseKind {
    /// No operators proposed.
    NoChange,
    /// Two or more operators share the top priority.
    Tie,
    /// Multiple operators whose priorities the policy cannot compare.
    /// Reserved; the default policy never emits it.
    Conflict,
    /// A clear winner exists but is not applicable in the current state.
    OperatorNoChange,
}

impl ImpasseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoChange => "no_change",
            Self::Tie => "tie",
            Self::Conflict => "conflict",
            Self::OperatorNoChange => "operator_no_change",
        }
    }
}

/// A decision-cycle outcome the rule engine alone cannot resolve.
#[derive(Debug, Clone)]
pub struct Impasse {
    pub kind: ImpasseKind,
    /// The proposals involved: the tied subset for a tie, the inapplicable
    /// winner for operator-no-change, empty for no-change.
    pub operators: Vec<Proposal>,
    pub description: String,
}

/// Outcome of classifying a proposal list.
#[derive(Debug, Clone)]
pub enum Selection {
    /// A clear, applicable winner.
    Operator(Proposal),
    Impasse(Impasse),
}

pub struct ImpasseDetector;

impl ImpasseDetector {
    /// Classify a proposal list (already sorted strongest-first).
    pub fn classify(proposals: &[Proposal], state: &EditorState, goal: &Goal) -> Selection {
        if proposals.is_empty() {
            return Selection::Impasse(Impasse {
                kind: ImpasseKind::NoChange,
                operators: Vec::new(),
                description: "no operators were proposed by any rule".to_string(),
            });
        }

        if proposals.len() == 1 {
            return Selection::Operator(proposals[0].clone());
        }

        let top_priority = proposals[0].priority;
        let tied: Vec<Proposal> = proposals
            .iter()
            .filter(|p| (p.priority - top_priority).abs() < f64::EPSILON)
            .cloned()
            .collect();

        if tied.len() > 1 {
            return Selection::Impasse(Impasse {
                kind: ImpasseKind::Tie,
                description: format!(
                    "{} operators tied at priority {top_priority}",
                    tied.len()
                ),
                operators: tied,
            });
        }

        // Distinct priorities: take the top, unless it cannot apply here.
        let winner = proposals[0].clone();
        if !winner.operator.is_applicable(state, goal) {
            return Selection::Impasse(Impasse {
                kind: ImpasseKind::OperatorNoChange,
                description: format!(
                    "selected operator {} is not applicable",
                    winner.operator.name()
                ),
                operators: vec![winner],
            });
        }

        Selection::Operator(winner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::rule_engine::ProposalSource;
    use crate::operators::{ListDirectory, ReadFile};

    fn proposal(op: crate::domain::models::SharedOperator, priority: f64) -> Proposal {
        Proposal {
            operator: op,
            priority,
            reason: "test".to_string(),
            source: ProposalSource::Rule("test".to_string()),
        }
    }

    #[test]
    fn empty_proposals_are_a_no_change_impasse() {
        let state = EditorState::new("/p");
        let goal = Goal::new("g");
        match ImpasseDetector::classify(&[], &state, &goal) {
            Selection::Impasse(imp) => assert_eq!(imp.kind, ImpasseKind::NoChange),
            Selection::Operator(_) => panic!("expected impasse"),
        }
    }

    #[test]
    fn single_proposal_wins_outright() {
        let state = EditorState::new("/p");
        let goal = Goal::new("g");
        let proposals = vec![proposal(ReadFile::shared("missing.py"), 5.0)];
        match ImpasseDetector::classify(&proposals, &state, &goal) {
            Selection::Operator(p) => assert_eq!(p.operator.name(), "read_file(missing.py)"),
            Selection::Impasse(_) => panic!("expected operator"),
        }
    }

    #[test]
    fn equal_top_priorities_tie() {
        let state = EditorState::new("/p");
        let goal = Goal::new("g");
        let proposals = vec![
            proposal(ReadFile::shared("a.py"), 5.0),
            proposal(ReadFile::shared("b.py"), 5.0),
            proposal(ListDirectory::shared("."), 3.0),
        ];
        match ImpasseDetector::classify(&proposals, &state, &goal) {
            Selection::Impasse(imp) => {
                assert_eq!(imp.kind, ImpasseKind::Tie);
                assert_eq!(imp.operators.len(), 2);
            }
            Selection::Operator(_) => panic!("expected tie"),
        }
    }

    #[test]
    fn inapplicable_winner_is_operator_no_change() {
        let state = EditorState::new("/nonexistent-dir-for-test");
        let goal = Goal::new("g");
        // read_file of a file that does not exist is inapplicable.
        let proposals = vec![
            proposal(ReadFile::shared("ghost.py"), 6.0),
            proposal(ListDirectory::shared("."), 3.0),
        ];
        match ImpasseDetector::classify(&proposals, &state, &goal) {
            Selection::Impasse(imp) => {
                assert_eq!(imp.kind, ImpasseKind::OperatorNoChange);
                assert_eq!(imp.operators[0].operator.name(), "read_file(ghost.py)");
            }
            Selection::Operator(_) => panic!("expected impasse"),
        }
    }
}
