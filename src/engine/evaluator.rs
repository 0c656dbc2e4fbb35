//! Fitness function for candidate code patches.
//!
//! Three gates, each worth more than the last: syntax (tree-sitter parse),
//! runtime (out-of-process python with a 10 s deadline), correctness (the
//! supplied tests print the "All tests passed" sentinel). Scores:
//!
//! - syntax invalid: 0
//! - runtime exception: 10-30 by error class
//! - runs, no tests supplied: 60
//! - runs, tests supplied but failing: 40
//! - sentinel present: 100

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::domain::ports::CodeAnalyzer;

const SANDBOX_TIMEOUT: Duration = Duration::from_secs(10);
const SUCCESS_SENTINEL: &str = "All tests passed";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub score: u8,
    pub syntax_valid: bool,
    pub runtime_valid: bool,
    pub correctness_valid: bool,
    pub error: Option<String>,
    pub output: Option<String>,
}

impl EvaluationResult {
    pub fn is_perfect(&self) -> bool {
        self.score == 100
    }

    /// The specific failure class, for the mutation prompt.
    pub fn failure_class(&self) -> &'static str {
        if !self.syntax_valid {
            return "SyntaxError";
        }
        let error = self.error.as_deref().unwrap_or("");
        for class in [
            "TypeError",
            "NameError",
            "AttributeError",
            "IndexError",
            "KeyError",
            "ValueError",
            "AssertionError",
        ] {
            if error.contains(class) {
                return class;
            }
        }
        if !self.runtime_valid {
            "RuntimeError"
        } else if !self.correctness_valid {
            "TestFailure"
        } else {
            "None"
        }
    }
}

/// Port over candidate evaluation so the evolutionary solver can be tested
/// with a scripted fitness function.
#[async_trait]
pub trait CandidateEvaluator: Send + Sync {
    async fn evaluate(&self, code: &str, test_code: Option<&str>) -> EvaluationResult;
}

pub struct CodeEvaluator {
    analyzer: Arc<dyn CodeAnalyzer>,
    timeout: Duration,
    interpreter: String,
}

impl CodeEvaluator {
    pub fn new(analyzer: Arc<dyn CodeAnalyzer>) -> Self {
        Self {
            analyzer,
            timeout: SANDBOX_TIMEOUT,
            interpreter: "python3".to_string(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run_sandboxed(&self, code: &str) -> (bool, Option<String>, Option<String>) {
        let mut file = match tempfile::Builder::new().suffix(".py").tempfile() {
            Ok(file) => file,
            Err(error) => return (false, Some(format!("sandbox setup failed: {error}")), None),
        };
        if let Err(error) = file.write_all(code.as_bytes()) {
            return (false, Some(format!("sandbox setup failed: {error}")), None);
        }

        let run = Command::new(&self.interpreter).arg(file.path()).output();
        let output = match tokio::time::timeout(self.timeout, run).await {
            Ok(Ok(output)) => output,
            Ok(Err(error)) => {
                return (false, Some(format!("execution error: {error}")), None)
            }
            Err(_) => {
                return (
                    false,
                    Some(format!("execution timeout ({}s)", self.timeout.as_secs())),
                    None,
                )
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let stdout = (!stdout.is_empty()).then_some(stdout);

        if output.status.success() {
            (true, None, stdout)
        } else {
            let error = if stderr.is_empty() {
                "unknown runtime error".to_string()
            } else {
                stderr
            };
            (false, Some(error), stdout)
        }
    }

    /// 10-30 depending on how close to working the error suggests the
    /// candidate is.
    fn score_runtime_error(error: Option<&str>) -> u8 {
        let Some(error) = error else { return 10 };
        if error.contains("TypeError") {
            25
        } else if error.contains("NameError")
            || error.contains("AttributeError")
            || error.contains("ValueError")
        {
            20
        } else if error.contains("IndexError") || error.contains("KeyError") {
            15
        } else {
            10
        }
    }
}

#[async_trait]
impl CandidateEvaluator for CodeEvaluator {
    async fn evaluate(&self, code: &str, test_code: Option<&str>) -> EvaluationResult {
        // Gate 1: syntax. Unsupported language never happens here (the
        // sandbox is python), but an analyzer miss falls through to the
        // runtime gate rather than failing the candidate.
        if let Some(false) = self.analyzer.syntax_valid(code, "python") {
            debug!("candidate failed the syntax gate");
            return EvaluationResult {
                score: 0,
                syntax_valid: false,
                runtime_valid: false,
                correctness_valid: false,
                error: Some("syntax error".to_string()),
                output: None,
            };
        }

        // Gate 2: runtime.
        let (runtime_valid, runtime_error, output) = self.run_sandboxed(code).await;
        if !runtime_valid {
            return EvaluationResult {
                score: Self::score_runtime_error(runtime_error.as_deref()),
                syntax_valid: true,
                runtime_valid: false,
                correctness_valid: false,
                error: runtime_error,
                output,
            };
        }

        // Gate 3: correctness, when tests are supplied.
        let Some(test_code) = test_code else {
            return EvaluationResult {
                score: 60,
                syntax_valid: true,
                runtime_valid: true,
                correctness_valid: false,
                error: None,
                output,
            };
        };

        let combined = format!("{code}\n\n{test_code}");
        let (tests_ran, test_error, test_output) = self.run_sandboxed(&combined).await;
        let sentinel_seen = test_output
            .as_deref()
            .map(|o| o.contains(SUCCESS_SENTINEL))
            .unwrap_or(false);

        if tests_ran && sentinel_seen {
            EvaluationResult {
                score: 100,
                syntax_valid: true,
                runtime_valid: true,
                correctness_valid: true,
                error: None,
                output: test_output,
            }
        } else {
            EvaluationResult {
                score: 40,
                syntax_valid: true,
                runtime_valid: true,
                correctness_valid: false,
                error: test_error.or_else(|| Some("tests did not pass".to_string())),
                output: test_output,
            }
        }
    }
}
