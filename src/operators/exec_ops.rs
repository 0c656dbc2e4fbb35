//! Execution operator: run a python file in a bounded subprocess.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::process::Command;

use crate::domain::models::{EditorState, Goal, Operator, OperatorResult, SharedOperator};

const RUN_TIMEOUT: Duration = Duration::from_secs(10);

/// Run a python file and capture its output into the state. Destructive:
/// executed code can do anything.
pub struct RunCode {
    name: String,
    path: String,
}

impl RunCode {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            name: format!("run_code({path})"),
            path,
        }
    }

    pub fn shared(path: impl Into<String>) -> SharedOperator {
        Arc::new(Self::new(path))
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

#[async_trait]
impl Operator for RunCode {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_destructive(&self) -> bool {
        true
    }

    fn params(&self) -> serde_json::Value {
        json!({ "op": "run_code", "path": self.path })
    }

    fn is_applicable(&self, state: &EditorState, _goal: &Goal) -> bool {
        std::path::Path::new(&state.working_directory)
            .join(&self.path)
            .is_file()
    }

    async fn execute(&self, state: &EditorState) -> OperatorResult {
        let output = Command::new("python3")
            .arg(&self.path)
            .current_dir(&state.working_directory)
            .output();

        let output = match tokio::time::timeout(RUN_TIMEOUT, output).await {
            Ok(Ok(output)) => output,
            Ok(Err(error)) => {
                return OperatorResult::failed(format!("failed to run {}: {error}", self.path))
            }
            Err(_) => {
                let mut new_state = state.clone();
                let message =
                    format!("execution of {} timed out after {}s", self.path, RUN_TIMEOUT.as_secs());
                new_state.push_error(message.clone());
                return OperatorResult {
                    success: false,
                    new_state: Some(new_state),
                    output: String::new(),
                    error: Some(message),
                };
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let code = output.status.code().unwrap_or(-1);
        let formatted = format!("Exit code: {code}\nSTDOUT:\n{stdout}\nSTDERR:\n{stderr}");

        let mut new_state = state.clone();
        new_state.last_output = Some(formatted.clone());

        if output.status.success() {
            OperatorResult::succeeded(new_state, formatted)
        } else {
            let error = stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("nonzero exit")
                .to_string();
            new_state.push_error(error.clone());
            OperatorResult {
                success: false,
                new_state: Some(new_state),
                output: formatted,
                error: Some(error),
            }
        }
    }
}
