//! Prompt templates for the heuristic reasoning modes.

use crate::engine::context_compressor::CompressedView;
use crate::llm::schemas::CodeCandidate;

/// System prompt shared by every structured query.
pub const SYSTEM_PROMPT: &str = "You are a reasoning assistant in a cognitive architecture.\n\
You must respond with ONLY valid JSON matching the provided schema.\n\
Be concise, precise, and actionable. Focus on concrete steps that can be executed.";

/// Prompt for a tie impasse: estimate P and C for each candidate operator.
pub fn evaluate_utilities(
    view: &CompressedView,
    operators: &[String],
    goal_value: f64,
) -> String {
    let mut parts = vec![
        format!("GOAL: {}", view.goal),
        format!("GOAL VALUE: {goal_value} (higher = more important)"),
        String::new(),
        "CURRENT STATE:".to_string(),
        view.to_prompt_block(),
        String::new(),
        "CANDIDATE OPERATORS:".to_string(),
    ];
    for (i, op) in operators.iter().enumerate() {
        parts.push(format!("{}. {op}", i + 1));
    }
    parts.extend([
        String::new(),
        "For EACH operator, estimate:".to_string(),
        "1. probability_of_success (0.0-1.0): how likely this advances the goal".to_string(),
        "2. estimated_cost (1-10): how expensive/slow this is".to_string(),
        "   - 1-3: quick operations (read file, list dir)".to_string(),
        "   - 4-7: medium operations (search, parse)".to_string(),
        "   - 8-10: expensive operations (compile, full test suite)".to_string(),
        String::new(),
        format!("The utility formula is U = P * G - C, where G = {goal_value}."),
        "Use the exact operator names given above in operator_name.".to_string(),
        "Include a 'recommendation' naming the best operator and why.".to_string(),
    ]);
    parts.join("\n")
}

/// Prompt for a no-change impasse: suggest concrete operators.
pub fn generate_operators(
    view: &CompressedView,
    error: Option<&str>,
    past_solutions: &[String],
) -> String {
    let mut parts = vec![
        format!("GOAL: {}", view.goal),
        String::new(),
        "CURRENT STATE:".to_string(),
        view.to_prompt_block(),
    ];
    if let Some(error) = error {
        parts.push(String::new());
        parts.push(format!("RECENT ERROR: {error}"));
    }
    if !past_solutions.is_empty() {
        parts.push(String::new());
        parts.push("SOLUTIONS THAT WORKED ON SIMILAR PROBLEMS:".to_string());
        for solution in past_solutions {
            parts.push(format!("- {solution}"));
        }
    }
    parts.extend([
        String::new(),
        "The symbolic reasoning system has no applicable rules for this situation.".to_string(),
        "Suggest 1-5 concrete operators that could make progress toward the goal.".to_string(),
        String::new(),
        "Available operator types:".to_string(),
        "- read_file: read a file (parameters: {\"path\": \"filename\"})".to_string(),
        "- list_dir: list directory contents (parameters: {\"path\": \"dirname\"})".to_string(),
        "- write_file: write a file (parameters: {\"path\": ..., \"content\": ...})".to_string(),
        "- apply_fix: replace a file with fixed content (parameters: {\"path\": ..., \"fix_description\": ..., \"fixed_content\": ...})".to_string(),
        "- run_code: execute a python file (parameters: {\"path\": \"filename\"})".to_string(),
    ]);
    parts.join("\n")
}

/// Prompt for generating an evolutionary population of code-fix candidates.
pub fn generate_population(error_context: &str, goal: &str, n: usize) -> String {
    format!(
        "GOAL: {goal}\n\n{error_context}\n\n\
Generate {n} DISTINCT hypotheses about what is wrong and a complete fixed \
version of the code for each. The candidates must differ meaningfully from \
each other: attack the problem from different angles.\n\
Do not propose re-reading files or other inspection steps that have already \
been tried; every candidate must be a concrete code patch.\n\
Each candidate needs: hypothesis (what is broken), code_patch (the complete \
corrected source, not a diff), reasoning (why this fixes it)."
    )
}

/// Prompt for mutating the best candidate using the evaluator's report.
pub fn mutate_candidate(candidate: &CodeCandidate, fitness_report: &str) -> String {
    format!(
        "A candidate code fix was evaluated and is not yet correct.\n\n\
HYPOTHESIS: {}\n\nCODE:\n```\n{}\n```\n\n\
FITNESS REPORT:\n{}\n\n\
Produce an improved version of this candidate that addresses the specific \
failure above. Keep what already works; change only what the report says is \
broken. Respond with hypothesis, code_patch (complete corrected source), and \
reasoning.",
        candidate.hypothesis, candidate.code_patch, fitness_report
    )
}
