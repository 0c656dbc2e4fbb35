//! ACT-R style conflict resolution.
//!
//! When the symbolic cycle cannot decide, the resolver asks the LLM for
//! per-operator probability/cost estimates and picks the candidate with
//! the highest utility:
//!
//! ```text
//! U = P * G - C - action_count * penalty_multiplier + Normal(0, sigma)
//! ```
//!
//! The tabu term keeps a stubborn favorite from looping; the noise term
//! buys exploration and is sampled fresh per call. Tests inject a seeded
//! generator for reproducibility.

use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use tracing::{debug, info, warn};

use crate::domain::models::{Config, EditorState, Goal, SharedOperator};
use crate::domain::ports::CodeAnalyzer;
use crate::llm::client::LlmClient;
use crate::llm::prompts;
use crate::llm::schemas::{
    operator_proposal_schema, utility_evaluation_schema, OperatorProposal, UtilityEvaluation,
};
use crate::memory::UnifiedMemory;
use crate::operators::materialize::materialize_suggestion;

use super::context_compressor::ContextCompressor;
use super::working_memory::WorkingMemory;

/// A resolver decision: the winning operator, its utility, and the LLM's
/// reasoning for the estimate that produced it.
pub struct Resolution {
    pub operator: SharedOperator,
    pub utility: f64,
    pub reasoning: String,
}

pub struct ActrResolver {
    llm: Arc<LlmClient>,
    compressor: ContextCompressor,
    goal_value: f64,
    noise_stddev: f64,
    penalty_multiplier: f64,
    memory: Option<Arc<UnifiedMemory>>,
    rng: Mutex<StdRng>,
}

impl ActrResolver {
    pub fn new(llm: Arc<LlmClient>, analyzer: Arc<dyn CodeAnalyzer>, config: &Config) -> Self {
        Self {
            llm,
            compressor: ContextCompressor::new(analyzer),
            goal_value: config.actr_goal_value,
            noise_stddev: config.actr_noise_stddev,
            penalty_multiplier: config.cognitive_history_penalty_multiplier,
            memory: None,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Give the resolver access to past resolutions for its prompts.
    pub fn with_memory(mut self, memory: Arc<UnifiedMemory>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Deterministic noise for tests.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    fn sample_noise(&self) -> f64 {
        let normal = match Normal::new(0.0, self.noise_stddev) {
            Ok(normal) => normal,
            Err(_) => return 0.0,
        };
        normal.sample(&mut *self.rng.lock().expect("rng lock"))
    }

    /// Ask the LLM to rate `operators` and pick the utility maximum.
    /// Returns `None` when the LLM is unavailable or its evaluation does
    /// not cover the candidate set.
    pub async fn resolve(
        &self,
        operators: &[SharedOperator],
        state: &EditorState,
        goal: &Goal,
        working_memory: &WorkingMemory,
    ) -> Option<Resolution> {
        if operators.is_empty() {
            return None;
        }

        let view = self.compressor.compress(state, goal);
        let names: Vec<String> = operators.iter().map(|op| op.name().to_string()).collect();
        let prompt = prompts::evaluate_utilities(&view, &names, self.goal_value);

        let evaluation: UtilityEvaluation = self
            .llm
            .structured_query(&prompt, prompts::SYSTEM_PROMPT, utility_evaluation_schema(), None)
            .await?;

        // Merge estimates back in input operator order; an evaluation that
        // does not cover every candidate is malformed.
        let mut scored: Vec<(SharedOperator, f64, String)> = Vec::with_capacity(operators.len());
        for operator in operators {
            let Some(estimate) = evaluation
                .evaluations
                .iter()
                .find(|e| e.operator_name == operator.name())
            else {
                warn!(
                    operator = operator.name(),
                    "utility evaluation does not cover this operator; discarding"
                );
                return None;
            };

            let penalty = f64::from(working_memory.action_count(operator.name()))
                * self.penalty_multiplier;
            let noise = self.sample_noise();
            let utility = estimate.probability_of_success * self.goal_value
                - estimate.estimated_cost
                - penalty
                + noise;

            debug!(
                operator = operator.name(),
                utility,
                p = estimate.probability_of_success,
                c = estimate.estimated_cost,
                penalty,
                noise,
                "utility computed"
            );
            scored.push((operator.clone(), utility, estimate.reasoning.clone()));
        }

        let (operator, utility, reasoning) = scored.into_iter().max_by(|a, b| {
            a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal)
        })?;

        info!(operator = operator.name(), utility, "resolver selected operator");
        Some(Resolution {
            operator,
            utility,
            reasoning,
        })
    }

    /// No-change entry point: ask the LLM for concrete operator
    /// suggestions and materialize them. `None` when the LLM is
    /// unavailable or nothing materializes.
    pub async fn generate_operators(
        &self,
        state: &EditorState,
        goal: &Goal,
    ) -> Option<Vec<SharedOperator>> {
        let view = self.compressor.compress(state, goal);
        let error = self.effective_error(state);

        let past_solutions = match &self.memory {
            Some(memory) => {
                let query = error.clone().unwrap_or_else(|| goal.description.clone());
                memory.retrieve_relevant_history(&query, 2).await
            }
            None => Vec::new(),
        };

        let prompt = prompts::generate_operators(&view, error.as_deref(), &past_solutions);
        let proposal: OperatorProposal = self
            .llm
            .structured_query(&prompt, prompts::SYSTEM_PROMPT, operator_proposal_schema(), None)
            .await?;

        let operators: Vec<SharedOperator> = proposal
            .operators
            .iter()
            .filter_map(|s| {
                let operator = materialize_suggestion(&s.name, &s.parameters);
                if operator.is_none() {
                    debug!(suggestion = %s.name, "unknown operator suggestion skipped");
                }
                operator
            })
            .collect();

        if operators.is_empty() {
            None
        } else {
            info!(count = operators.len(), "LLM generated operator candidates");
            Some(operators)
        }
    }

    /// The error to reason about: the logged one, or a synthesized test
    /// failure when the code ran clean but its embedded tests clearly did
    /// not pass.
    fn effective_error(&self, state: &EditorState) -> Option<String> {
        if let Some(error) = state.last_error() {
            return Some(error.to_string());
        }

        let output = state.last_output.as_deref()?;
        let has_test_harness = state.open_files.values().any(|f| {
            f.content.contains("def test_") || f.content.contains("if __name__ == \"__main__\"")
        });
        if !has_test_harness {
            return None;
        }

        let lower = output.to_lowercase();
        let ran_clean = lower.contains("exit code: 0");
        let tests_passed = lower.contains("all tests passed");
        if ran_clean && !tests_passed {
            Some(
                "Tests failed: code runs without exceptions but tests did not pass. \
                 The goal requires the tests to pass."
                    .to_string(),
            )
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::OperatorResult;
    use crate::domain::ports::{ChatRequest, ChatResponse, LlmTransport};
    use crate::infrastructure::ast::TreeSitterAnalyzer;
    use crate::operators::ReadFile;
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::json;

    struct FixedTransport {
        content: String,
    }

    #[async_trait]
    impl LlmTransport for FixedTransport {
        async fn chat(&self, _request: ChatRequest) -> anyhow::Result<ChatResponse> {
            Ok(ChatResponse {
                content: self.content.clone(),
            })
        }

        async fn list_models(&self) -> anyhow::Result<Vec<String>> {
            Ok(vec![])
        }
    }

    fn resolver_with(content: &str, noise_stddev: f64, penalty: f64) -> ActrResolver {
        let config = Config {
            actr_noise_stddev: noise_stddev,
            cognitive_history_penalty_multiplier: penalty,
            ..Config::default()
        };
        let llm = Arc::new(LlmClient::with_transport(
            Arc::new(FixedTransport {
                content: content.to_string(),
            }),
            &config,
        ));
        ActrResolver::new(llm, Arc::new(TreeSitterAnalyzer::new()), &config).with_rng_seed(7)
    }

    fn evaluation_json(entries: &[(&str, f64, f64)]) -> String {
        let evaluations: Vec<_> = entries
            .iter()
            .map(|(name, p, c)| {
                json!({
                    "operator_name": name,
                    "probability_of_success": p,
                    "estimated_cost": c,
                    "reasoning": "scripted"
                })
            })
            .collect();
        json!({ "evaluations": evaluations, "recommendation": "scripted" }).to_string()
    }

    #[tokio::test]
    async fn highest_utility_operator_wins_with_zero_noise() {
        let content = evaluation_json(&[
            ("read_file(a.py)", 0.9, 2.0),
            ("read_file(b.py)", 0.2, 5.0),
        ]);
        let resolver = resolver_with(&content, 0.0, 2.0);

        let ops = vec![ReadFile::shared("a.py"), ReadFile::shared("b.py")];
        let wm = WorkingMemory::new(EditorState::new("/p"));
        let resolution = resolver
            .resolve(&ops, &EditorState::new("/p"), &Goal::new("Open config"), &wm)
            .await
            .unwrap();

        assert_eq!(resolution.operator.name(), "read_file(a.py)");
        // U = 0.9 * 10 - 2 with no penalty and no noise.
        assert!((resolution.utility - 7.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn history_penalty_eventually_dethrones_the_favorite() {
        let content = evaluation_json(&[
            ("read_file(a.py)", 0.9, 2.0),
            ("list_dir(.)", 0.6, 2.0),
        ]);
        let resolver = resolver_with(&content, 0.0, 2.0);

        let ops = vec![
            ReadFile::shared("a.py"),
            crate::operators::ListDirectory::shared("."),
        ];
        let goal = Goal::new("make progress");

        // Favorite: U = 7 - 2n. Competitor: U = 4. Crossover at n = 2.
        for (count, expected) in [(0u32, "read_file(a.py)"), (1, "read_file(a.py)"), (2, "list_dir(.)")] {
            let mut wm = WorkingMemory::new(EditorState::new("/p"));
            for _ in 0..count {
                let op = ReadFile::new("a.py");
                let result = OperatorResult {
                    success: false,
                    new_state: None,
                    output: String::new(),
                    error: Some("stuck".to_string()),
                };
                wm.record_transition(&op, &result, EditorState::new("/p"), &goal);
            }

            let resolution = resolver
                .resolve(&ops, &EditorState::new("/p"), &goal, &wm)
                .await
                .unwrap();
            assert_eq!(
                resolution.operator.name(),
                expected,
                "wrong winner at action-count {count}"
            );
        }
    }

    #[tokio::test]
    async fn evaluation_missing_an_operator_is_discarded() {
        let content = evaluation_json(&[("read_file(a.py)", 0.9, 2.0)]);
        let resolver = resolver_with(&content, 0.0, 2.0);

        let ops = vec![ReadFile::shared("a.py"), ReadFile::shared("b.py")];
        let wm = WorkingMemory::new(EditorState::new("/p"));
        let resolution = resolver
            .resolve(&ops, &EditorState::new("/p"), &Goal::new("g"), &wm)
            .await;

        assert!(resolution.is_none());
    }

    #[tokio::test]
    async fn generated_suggestions_are_materialized() {
        let content = json!({
            "operators": [
                { "name": "read_file", "parameters": { "path": "main.py" }, "reasoning": "inspect" },
                { "name": "teleport", "parameters": {}, "reasoning": "nonsense" }
            ],
            "reasoning": "scripted"
        })
        .to_string();
        let resolver = resolver_with(&content, 0.0, 2.0);

        let ops = resolver
            .generate_operators(&EditorState::new("/p"), &Goal::new("do something"))
            .await
            .unwrap();

        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].name(), "read_file(main.py)");
    }

    #[test]
    fn silent_test_failures_are_synthesized_into_errors() {
        let config = Config::default();
        let llm = Arc::new(LlmClient::with_transport(
            Arc::new(FixedTransport {
                content: String::new(),
            }),
            &config,
        ));
        let resolver = ActrResolver::new(llm, Arc::new(TreeSitterAnalyzer::new()), &config);

        let mut state = EditorState::new("/p");
        state.open_files.insert(
            "t.py".to_string(),
            crate::domain::models::FileRecord::new(
                "t.py",
                "def test_x():\n    assert False\n",
                "python",
                Utc::now(),
            ),
        );
        state.last_output = Some("Exit code: 0\nSTDOUT:\n\nSTDERR:\n".to_string());

        let error = resolver.effective_error(&state).unwrap();
        assert!(error.contains("tests did not pass"));
    }
}
