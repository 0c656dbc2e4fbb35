//! Evolutionary search over candidate code patches.
//!
//! Generation 0 is a diverse LLM-generated population; each later
//! generation keeps a mutation of the best candidate (steered by the
//! evaluator's fitness report) plus fresh candidates to fill the
//! population. Any candidate scoring 100 short-circuits the whole search.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::models::Config;
use crate::llm::client::LlmClient;
use crate::llm::prompts;
use crate::llm::schemas::{
    code_candidate_schema, population_proposal_schema, CodeCandidate, PopulationProposal,
};

use super::evaluator::{CandidateEvaluator, EvaluationResult};

pub struct EvolutionarySolver {
    llm: Arc<LlmClient>,
    evaluator: Arc<dyn CandidateEvaluator>,
    population_size: usize,
    max_generations: usize,
}

impl EvolutionarySolver {
    pub fn new(
        llm: Arc<LlmClient>,
        evaluator: Arc<dyn CandidateEvaluator>,
        config: &Config,
    ) -> Self {
        // Config is clamped on load; clamp again so a hand-built config
        // cannot run the solver out of its envelope.
        let normalized = config.clone().normalized();
        Self {
            llm,
            evaluator,
            population_size: normalized.evolution_population_size as usize,
            max_generations: normalized.evolution_max_generations as usize,
        }
    }

    pub fn population_size(&self) -> usize {
        self.population_size
    }

    /// Ask the LLM for `n` distinct candidates.
    async fn generate_population(
        &self,
        error_context: &str,
        goal: &str,
        n: usize,
    ) -> Vec<CodeCandidate> {
        let prompt = prompts::generate_population(error_context, goal, n);
        let proposal: Option<PopulationProposal> = self
            .llm
            .structured_query(&prompt, prompts::SYSTEM_PROMPT, population_proposal_schema(), None)
            .await;

        match proposal {
            Some(proposal) => {
                let mut candidates = proposal.candidates;
                candidates.truncate(n);
                candidates
            }
            None => {
                warn!("population generation failed; LLM unavailable or malformed");
                Vec::new()
            }
        }
    }

    /// Score candidates in order, stopping early at the first perfect one.
    /// Returns (candidate, result) pairs sorted best-first.
    async fn evaluate_candidates(
        &self,
        candidates: Vec<CodeCandidate>,
        test_code: Option<&str>,
    ) -> Vec<(CodeCandidate, EvaluationResult)> {
        let mut scored = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let result = self.evaluator.evaluate(&candidate.code_patch, test_code).await;
            debug!(
                score = result.score,
                hypothesis = %candidate.hypothesis,
                "candidate evaluated"
            );
            let perfect = result.is_perfect();
            scored.push((candidate, result));
            if perfect {
                break;
            }
        }

        scored.sort_by(|a, b| b.1.score.cmp(&a.1.score));
        scored
    }

    /// Mutate the best candidate, steering the LLM with the specific
    /// failure class from the evaluator's report.
    async fn mutate(
        &self,
        candidate: &CodeCandidate,
        report: &EvaluationResult,
    ) -> Option<CodeCandidate> {
        let fitness_report = format_fitness_report(report);
        let prompt = prompts::mutate_candidate(candidate, &fitness_report);
        self.llm
            .structured_query(&prompt, prompts::SYSTEM_PROMPT, code_candidate_schema(), None)
            .await
    }

    /// Run the search. Returns the best candidate seen; `None` only when
    /// generation 0 could not be produced at all.
    pub async fn evolve(
        &self,
        error_context: &str,
        goal: &str,
        original_code: &str,
        test_code: Option<&str>,
    ) -> Option<CodeCandidate> {
        info!(
            population = self.population_size,
            generations = self.max_generations,
            "starting evolutionary search"
        );

        let context = format!("{error_context}\n\nORIGINAL CODE:\n```\n{original_code}\n```");

        let population = self
            .generate_population(&context, goal, self.population_size)
            .await;
        if population.is_empty() {
            return None;
        }

        let mut evaluated = self.evaluate_candidates(population, test_code).await;
        let (mut best, mut best_result) = evaluated.first().cloned()?;
        if best_result.is_perfect() {
            info!("perfect candidate found in generation 0");
            return Some(best);
        }

        for generation in 1..=self.max_generations {
            debug!(generation, best_score = best_result.score, "next generation");

            let mut next_population = Vec::with_capacity(self.population_size);
            if let Some(mutated) = self.mutate(&best, &best_result).await {
                next_population.push(mutated);
            }

            let remaining = self.population_size.saturating_sub(next_population.len());
            if remaining > 0 {
                next_population.extend(
                    self.generate_population(&context, goal, remaining).await,
                );
            }
            if next_population.is_empty() {
                warn!(generation, "failed to produce a generation; stopping early");
                break;
            }

            evaluated = self.evaluate_candidates(next_population, test_code).await;
            let Some((generation_best, generation_result)) = evaluated.first().cloned() else {
                break;
            };

            if generation_result.score > best_result.score {
                info!(
                    generation,
                    score = generation_result.score,
                    "new best candidate"
                );
                best = generation_best;
                best_result = generation_result;
            }

            if best_result.is_perfect() {
                info!(generation, "perfect candidate found");
                return Some(best);
            }
        }

        info!(score = best_result.score, "returning best candidate seen");
        Some(best)
    }
}

fn format_fitness_report(result: &EvaluationResult) -> String {
    let mut lines = vec![format!(
        "- Syntax: {}",
        if result.syntax_valid { "PASS" } else { "FAIL" }
    )];
    lines.push(format!(
        "- Runtime: {}",
        if result.runtime_valid { "PASS" } else { "FAIL" }
    ));
    if result.runtime_valid {
        lines.push(format!(
            "- Correctness: {}",
            if result.correctness_valid { "PASS" } else { "FAIL" }
        ));
    }
    lines.push(format!("- Failure class: {}", result.failure_class()));
    if let Some(error) = &result.error {
        lines.push(format!("- Error: {error}"));
    }
    if let Some(output) = &result.output {
        let head: String = output.lines().take(5).collect::<Vec<_>>().join(" ");
        lines.push(format!("- Output: {head}"));
    }
    lines.join("\n")
}
