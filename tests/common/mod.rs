//! Shared fixtures for the integration tests: scripted LLM transports and
//! state builders.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use mindvalve::domain::models::EditorState;
use mindvalve::domain::ports::{ChatRequest, ChatResponse, LlmTransport};
use mindvalve::engine::rule_engine::{Rule, RuleEngine};
use mindvalve::operators::ReadFile;

/// Transport that answers by matching a substring of the prompt; anything
/// unmatched is a connection failure. Counts calls for assertions.
pub struct ScriptedTransport {
    rules: Vec<(String, String)>,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(rules: Vec<(&str, String)>) -> Self {
        Self {
            rules: rules
                .into_iter()
                .map(|(needle, response)| (needle.to_string(), response))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmTransport for ScriptedTransport {
    async fn chat(&self, request: ChatRequest) -> anyhow::Result<ChatResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let prompt = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();

        for (needle, response) in &self.rules {
            if prompt.contains(needle.as_str()) {
                return Ok(ChatResponse {
                    content: response.clone(),
                });
            }
        }
        Err(anyhow::anyhow!("no scripted response for this prompt"))
    }

    async fn list_models(&self) -> anyhow::Result<Vec<String>> {
        Ok(vec!["scripted".to_string()])
    }
}

/// Transport standing in for an unreachable model server.
pub struct UnavailableTransport;

#[async_trait]
impl LlmTransport for UnavailableTransport {
    async fn chat(&self, _request: ChatRequest) -> anyhow::Result<ChatResponse> {
        Err(anyhow::anyhow!("connection refused"))
    }

    async fn list_models(&self) -> anyhow::Result<Vec<String>> {
        Err(anyhow::anyhow!("connection refused"))
    }
}

pub fn state_in(dir: &tempfile::TempDir) -> EditorState {
    EditorState::new(dir.path().to_string_lossy().to_string())
}

pub fn python_available() -> bool {
    std::process::Command::new("python3")
        .arg("--version")
        .output()
        .is_ok()
}

/// Two rules proposing reads of different config files at equal priority.
/// Their conditions burn a little wall time so state-time pressure can
/// accumulate across impasse cycles.
pub fn tied_config_rules() -> RuleEngine {
    let mut engine = RuleEngine::empty();
    for file in ["config.yaml", "config.json"] {
        let path = file.to_string();
        let factory_path = path.clone();
        engine.add_rule(Rule::new(
            format!("open_{file}"),
            format!("Open {file} for the configuration goal"),
            5.0,
            Box::new(move |s, _g| {
                std::thread::sleep(Duration::from_micros(500));
                !s.open_files.contains_key(&path)
            }),
            Box::new(move |_s, _g| Some(ReadFile::shared(factory_path.clone()))),
        ));
    }
    engine
}

/// Scripted utility evaluation covering the two tied config readers, with
/// a decisive gap.
pub fn config_tie_evaluation() -> String {
    serde_json::json!({
        "evaluations": [
            {
                "operator_name": "read_file(config.yaml)",
                "probability_of_success": 0.9,
                "estimated_cost": 2.0,
                "reasoning": "the yaml file is the primary configuration"
            },
            {
                "operator_name": "read_file(config.json)",
                "probability_of_success": 0.2,
                "estimated_cost": 5.0,
                "reasoning": "the json file is a stale duplicate"
            }
        ],
        "recommendation": "read_file(config.yaml) is cheap and likely to help"
    })
    .to_string()
}

pub fn transport(rules: Vec<(&str, String)>) -> Arc<ScriptedTransport> {
    Arc::new(ScriptedTransport::new(rules))
}
