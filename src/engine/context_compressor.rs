//! Goal/error-prioritized compression of state for LLM prompts.
//!
//! Produces a bounded view: the goal text and the latest error are always
//! carried in full; file content is cut down to the function named in the
//! goal or error, a window around the error line, or a summary. Output is
//! deterministic for identical inputs.

use std::collections::BTreeMap;
use std::sync::Arc;

use regex::Regex;
use std::sync::OnceLock;

use crate::domain::models::{EditorState, FileRecord, Goal};
use crate::domain::ports::CodeAnalyzer;

/// Lines kept on each side of an error line.
const ERROR_WINDOW: usize = 10;
/// Leading lines included in a file summary.
const SUMMARY_HEAD_LINES: usize = 10;
/// Function names listed in a file summary.
const SUMMARY_FUNCTIONS: usize = 5;

/// File priority boosts.
const GOAL_MENTION_BOOST: f64 = 5.0;
const ERROR_MENTION_BOOST: f64 = 3.0;
const CURSOR_BOOST: f64 = 2.0;

/// The compressed, prompt-ready view of a state.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressedView {
    pub goal: String,
    pub working_directory: String,
    /// The most recent error, verbatim.
    pub error: Option<String>,
    /// Open-file paths ranked by relevance.
    pub ranked_files: Vec<String>,
    pub relevant_code: BTreeMap<String, String>,
    pub file_summaries: BTreeMap<String, String>,
}

impl CompressedView {
    /// Render as prompt text.
    pub fn to_prompt_block(&self) -> String {
        let mut parts = vec![
            format!("- Working directory: {}", self.working_directory),
            format!("- Open files: [{}]", self.ranked_files.join(", ")),
        ];
        if let Some(error) = &self.error {
            parts.push(format!("\nRECENT ERROR: {error}"));
        }
        if !self.relevant_code.is_empty() {
            parts.push("\nRELEVANT CODE:".to_string());
            for (path, code) in &self.relevant_code {
                parts.push(format!("\n{path}:\n```\n{code}\n```"));
            }
        }
        if !self.file_summaries.is_empty() {
            parts.push("\nFILE SUMMARIES:".to_string());
            for (path, summary) in &self.file_summaries {
                parts.push(format!("- {path}: {summary}"));
            }
        }
        parts.join("\n")
    }
}

pub struct ContextCompressor {
    max_tokens: usize,
    chars_per_token: f64,
    analyzer: Arc<dyn CodeAnalyzer>,
}

impl ContextCompressor {
    pub fn new(analyzer: Arc<dyn CodeAnalyzer>) -> Self {
        Self {
            max_tokens: 4096,
            chars_per_token: 4.0,
            analyzer,
        }
    }

    pub fn with_budget(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn estimate_tokens(&self, text: &str) -> usize {
        (text.len() as f64 / self.chars_per_token) as usize
    }

    /// Compress `state` for the LLM. The goal and latest error are never
    /// dropped, whatever the budget.
    pub fn compress(&self, state: &EditorState, goal: &Goal) -> CompressedView {
        let mut view = CompressedView {
            goal: goal.description.clone(),
            working_directory: state.working_directory.clone(),
            error: state.last_error().map(str::to_string),
            ranked_files: Vec::new(),
            relevant_code: BTreeMap::new(),
            file_summaries: BTreeMap::new(),
        };

        let max_chars = (self.max_tokens as f64 * self.chars_per_token) as usize;
        let base = view.goal.len()
            + view.working_directory.len()
            + view.error.as_deref().map(str::len).unwrap_or(0);
        let mut remaining = max_chars.saturating_sub(base);

        for (path, _priority) in self.rank_files(state, goal) {
            view.ranked_files.push(path.clone());
            if remaining == 0 {
                continue;
            }
            let Some(file) = state.open_files.get(&path) else {
                continue;
            };

            match self.extract_relevant(file, goal, state, remaining) {
                Some(section) => {
                    remaining = remaining.saturating_sub(section.len());
                    view.relevant_code.insert(path, section);
                }
                None => {
                    let summary = self.summarize(file);
                    remaining = remaining.saturating_sub(summary.len());
                    view.file_summaries.insert(path, summary);
                }
            }
        }

        view
    }

    /// Priority = 1 + 5 x goal mention + 3 x error mention + 2 x cursor
    /// presence; ties broken by path so the ranking is deterministic.
    fn rank_files(&self, state: &EditorState, goal: &Goal) -> Vec<(String, f64)> {
        let mut ranked: Vec<(String, f64)> = state
            .open_files
            .keys()
            .map(|path| {
                let mut score = 1.0;
                if goal.description.contains(path.as_str()) {
                    score += GOAL_MENTION_BOOST;
                }
                if state
                    .error_log
                    .iter()
                    .rev()
                    .take(3)
                    .any(|e| e.contains(path.as_str()))
                {
                    score += ERROR_MENTION_BOOST;
                }
                if state.cursor_position.contains_key(path) {
                    score += CURSOR_BOOST;
                }
                (path.clone(), score)
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        ranked
    }

    fn extract_relevant(
        &self,
        file: &FileRecord,
        goal: &Goal,
        state: &EditorState,
        max_chars: usize,
    ) -> Option<String> {
        if file.content.len() <= max_chars {
            return Some(file.content.clone());
        }

        // A function named in the goal or error beats everything else.
        if self.analyzer.supports(&file.language) {
            let referenced: String = format!(
                "{} {}",
                goal.description,
                state.last_error().unwrap_or("")
            );
            for function in self.analyzer.functions(&file.content, &file.language) {
                if referenced.contains(&function.name) && function.text.len() <= max_chars {
                    return Some(format!("# Function: {}\n{}", function.name, function.text));
                }
            }
        }

        // Otherwise a window around the error line, when one is named.
        if let Some(line) = state.last_error().and_then(error_line_number) {
            let window = line_window(&file.content, line.saturating_sub(1), ERROR_WINDOW);
            if !window.is_empty() && window.len() <= max_chars {
                return Some(format!("# Around line {line}\n{window}"));
            }
        }

        None
    }

    fn summarize(&self, file: &FileRecord) -> String {
        let line_count = file.content.lines().count();
        let mut parts = vec![format!("<{} file, {} lines>", file.language, line_count)];

        let functions = self.analyzer.functions(&file.content, &file.language);
        if !functions.is_empty() {
            let names: Vec<&str> = functions
                .iter()
                .take(SUMMARY_FUNCTIONS)
                .map(|f| f.name.as_str())
                .collect();
            parts.push(format!("Functions: {}", names.join(", ")));
            if functions.len() > SUMMARY_FUNCTIONS {
                parts.push(format!("... and {} more", functions.len() - SUMMARY_FUNCTIONS));
            }
        }

        let head: Vec<&str> = file.content.lines().take(SUMMARY_HEAD_LINES).collect();
        if line_count > SUMMARY_HEAD_LINES {
            parts.push(format!("{}\n... (truncated)", head.join("\n")));
        } else {
            parts.push(head.join("\n"));
        }
        parts.join(" | ")
    }
}

fn error_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"line (\d+)").expect("static regex"))
}

/// One-based line number named in an error message, if any.
fn error_line_number(error: &str) -> Option<usize> {
    error_line_regex()
        .captures(error)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Lines [center - radius, center + radius] of `text` (zero-based center).
fn line_window(text: &str, center: usize, radius: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    if lines.is_empty() {
        return String::new();
    }
    let start = center.saturating_sub(radius);
    let end = (center + radius + 1).min(lines.len());
    if start >= lines.len() {
        return String::new();
    }
    lines[start..end].join("\n")
}
