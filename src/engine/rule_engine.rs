//! Symbolic production rules and the proposal engine.
//!
//! Rules are host-code predicates paired with operator factories. The
//! engine evaluates every rule against (state, goal) and returns proposals
//! sorted by descending priority, stable on ties in registration order.
//! Identical operators proposed by several rules collapse into one
//! proposal (the strongest occurrence wins).

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

use crate::domain::models::{EditorState, Goal, SharedOperator};
use crate::operators::{ListDirectory, ReadFile};

/// Priority of proposals materialized from learned chunks; strictly above
/// every default rule.
pub const MEMORY_PRIORITY: f64 = 7.0;

/// Where a proposal came from; memory-sourced proposals carry the chunk id
/// so its counters can be updated after execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProposalSource {
    Rule(String),
    Memory { chunk_id: String },
}

/// One proposed operator with its priority and the reason it fired.
#[derive(Clone)]
pub struct Proposal {
    pub operator: SharedOperator,
    pub priority: f64,
    pub reason: String,
    pub source: ProposalSource,
}

impl std::fmt::Debug for Proposal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Proposal")
            .field("operator", &self.operator.name())
            .field("priority", &self.priority)
            .field("reason", &self.reason)
            .field("source", &self.source)
            .finish()
    }
}

pub type RuleCondition = Box<dyn Fn(&EditorState, &Goal) -> bool + Send + Sync>;
pub type OperatorFactory = Box<dyn Fn(&EditorState, &Goal) -> Option<SharedOperator> + Send + Sync>;

/// IF condition(state, goal) THEN propose factory(state, goal).
pub struct Rule {
    pub name: String,
    pub description: String,
    pub priority: f64,
    condition: RuleCondition,
    factory: OperatorFactory,
}

impl Rule {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        priority: f64,
        condition: RuleCondition,
        factory: OperatorFactory,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            priority,
            condition,
            factory,
        }
    }

    /// Evaluate the condition defensively: a panicking condition is a
    /// non-match.
    fn matches(&self, state: &EditorState, goal: &Goal) -> bool {
        catch_unwind(AssertUnwindSafe(|| (self.condition)(state, goal))).unwrap_or_else(|_| {
            warn!(rule = %self.name, "rule condition panicked; treated as non-match");
            false
        })
    }
}

/// Ordered registry of production rules.
pub struct RuleEngine {
    rules: Vec<Rule>,
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleEngine {
    pub fn new() -> Self {
        let mut engine = Self { rules: Vec::new() };
        engine.register_default_rules();
        engine
    }

    /// An engine with no rules registered; for tests and callers that
    /// supply their own rule set.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Match every rule and return deduplicated proposals, strongest first.
    pub fn propose(&self, state: &EditorState, goal: &Goal) -> Vec<Proposal> {
        let mut proposals: Vec<Proposal> = Vec::new();

        for rule in &self.rules {
            if !rule.matches(state, goal) {
                continue;
            }
            let Some(operator) = (rule.factory)(state, goal) else {
                warn!(rule = %rule.name, "rule matched but produced no operator; skipped");
                continue;
            };
            proposals.push(Proposal {
                operator,
                priority: rule.priority,
                reason: rule.description.clone(),
                source: ProposalSource::Rule(rule.name.clone()),
            });
        }

        sort_and_dedupe(proposals)
    }

    fn register_default_rules(&mut self) {
        // Error-driven file open: the strongest signal we have.
        self.add_rule(Rule::new(
            "open_file_from_error",
            "Open the file named in the most recent error",
            6.0,
            Box::new(|s, _g| error_names_unopened_file(s)),
            Box::new(|s, _g| {
                filename_from_error(s)
                    .map(|path| ReadFile::shared(path))
            }),
        ));

        // Goal names a file that is not open yet.
        self.add_rule(Rule::new(
            "open_mentioned_file",
            "Open a file mentioned in the goal",
            5.0,
            Box::new(|s, g| goal_names_unopened_file(s, g)),
            Box::new(|s, g| {
                filename_from_goal(s, g)
                    .map(|path| ReadFile::shared(path))
            }),
        ));

        // Inspection verbs plus a file reference: read it.
        self.add_rule(Rule::new(
            "read_for_inspection",
            "Read files for inspection goals",
            5.0,
            Box::new(|s, g| {
                let text = g.description.to_lowercase();
                INSPECTION_WORDS.iter().any(|w| text.contains(w))
                    && goal_names_unopened_file(s, g)
            }),
            Box::new(|s, g| {
                filename_from_goal(s, g)
                    .map(|path| ReadFile::shared(path))
            }),
        ));

        // Explicit exploration request.
        self.add_rule(Rule::new(
            "list_directory_for_exploration",
            "List the directory when exploring",
            4.0,
            Box::new(|s, g| {
                g.description.to_lowercase().contains("list") && s.open_files.is_empty()
            }),
            Box::new(|_s, _g| Some(ListDirectory::shared("."))),
        ));

        // Nothing open, short vague goal, but we at least know where we
        // are: look around.
        self.add_rule(Rule::new(
            "explore_when_lost",
            "List the directory when there is no context",
            3.0,
            Box::new(|s, g| {
                !s.working_directory.is_empty()
                    && s.open_files.is_empty()
                    && g.description.len() < 50
            }),
            Box::new(|_s, _g| Some(ListDirectory::shared("."))),
        ));
    }
}

const INSPECTION_WORDS: [&str; 7] = ["read", "check", "inspect", "look", "bug", "fix", "analyze"];

/// Stable-sort by descending priority, then drop later duplicates of the
/// same operator name.
pub fn sort_and_dedupe(mut proposals: Vec<Proposal>) -> Vec<Proposal> {
    proposals.sort_by(|a, b| {
        b.priority
            .partial_cmp(&a.priority)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut seen: Vec<String> = Vec::new();
    proposals.retain(|p| {
        let name = p.operator.name().to_string();
        if seen.contains(&name) {
            false
        } else {
            seen.push(name);
            true
        }
    });
    proposals
}

fn filename_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\w\-]+\.\w+").expect("static regex"))
}

fn filenames_in(text: &str) -> Vec<String> {
    filename_regex()
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

fn goal_names_unopened_file(state: &EditorState, goal: &Goal) -> bool {
    filenames_in(&goal.description)
        .iter()
        .any(|f| !state.open_files.contains_key(f))
}

fn filename_from_goal(state: &EditorState, goal: &Goal) -> Option<String> {
    filenames_in(&goal.description)
        .into_iter()
        .find(|f| !state.open_files.contains_key(f))
}

fn error_names_unopened_file(state: &EditorState) -> bool {
    state
        .last_error()
        .map(|e| {
            filenames_in(e)
                .iter()
                .any(|f| !state.open_files.contains_key(f))
        })
        .unwrap_or(false)
}

fn filename_from_error(state: &EditorState) -> Option<String> {
    state.last_error().and_then(|e| {
        filenames_in(e)
            .into_iter()
            .find(|f| !state.open_files.contains_key(f))
    })
}
