//! Typed structured-output LLM client.
//!
//! Wraps the transport port with schema validation and a bounded retry
//! budget. Every failure mode - timeout, connection refusal, unparseable
//! output, schema violation - ends in `None` after the retries are spent;
//! nothing here ever reaches the caller as an error. Retries are
//! immediate, so worst-case latency is `timeout x (max_retries + 1)`.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::domain::models::Config;
use crate::domain::ports::{ChatMessage, ChatRequest, LlmTransport};
use crate::infrastructure::ollama::OllamaTransport;

use super::schemas::SchemaValidated;

pub struct LlmClient {
    transport: Arc<dyn LlmTransport>,
    model: String,
    temperature: f32,
    max_retries: u32,
}

impl LlmClient {
    /// Client over the default HTTP transport described by `config`.
    pub fn new(config: &Config) -> Self {
        let transport = Arc::new(OllamaTransport::new(
            config.llm_host.clone(),
            config.llm_timeout,
        ));
        Self::with_transport(transport, config)
    }

    /// Client over an injected transport; how tests script responses.
    pub fn with_transport(transport: Arc<dyn LlmTransport>, config: &Config) -> Self {
        Self {
            transport,
            model: config.llm_model.clone(),
            temperature: config.llm_temperature,
            max_retries: config.llm_max_retries,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Query the model for a value of type `T`, enforcing `schema` on the
    /// server where supported and re-validating locally. Returns `None`
    /// once the retry budget is exhausted; callers treat that as "LLM
    /// unavailable" and degrade gracefully.
    pub async fn structured_query<T>(
        &self,
        prompt: &str,
        system_prompt: &str,
        schema: serde_json::Value,
        temperature: Option<f32>,
    ) -> Option<T>
    where
        T: DeserializeOwned + SchemaValidated,
    {
        let mut prompt = prompt.to_string();

        for attempt in 0..=self.max_retries {
            let request = ChatRequest {
                model: self.model.clone(),
                messages: vec![
                    ChatMessage::system(system_prompt),
                    ChatMessage::user(&prompt),
                ],
                format: Some(schema.clone()),
                temperature: temperature.unwrap_or(self.temperature),
            };

            let response = match self.transport.chat(request).await {
                Ok(response) => response,
                Err(error) => {
                    warn!(attempt, %error, "LLM transport failed");
                    continue;
                }
            };

            let parsed: T = match serde_json::from_str(&response.content) {
                Ok(parsed) => parsed,
                Err(error) => {
                    debug!(attempt, %error, "LLM output failed to parse");
                    prompt.push_str(
                        "\n\nPrevious attempt failed validation. \
                         Ensure the response matches the schema exactly.",
                    );
                    continue;
                }
            };

            match parsed.validate() {
                Ok(()) => return Some(parsed),
                Err(reason) => {
                    debug!(attempt, %reason, "LLM output failed schema validation");
                    prompt.push_str(&format!(
                        "\n\nPrevious attempt was rejected: {reason}. \
                         Ensure the response matches the schema exactly."
                    ));
                }
            }
        }

        warn!(
            retries = self.max_retries,
            "LLM query exhausted its retry budget"
        );
        None
    }

    /// Lightweight reachability probe, bounded by the transport timeout.
    pub async fn check_connection(&self) -> bool {
        self.transport.list_models().await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::ChatResponse;
    use crate::llm::schemas::{OperatorProposal, operator_proposal_schema};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Transport returning a fixed sequence of outcomes, then failing.
    struct SequenceTransport {
        responses: Vec<Result<String, String>>,
        calls: AtomicUsize,
    }

    impl SequenceTransport {
        fn new(responses: Vec<Result<String, String>>) -> Self {
            Self {
                responses,
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmTransport for SequenceTransport {
        async fn chat(&self, _request: ChatRequest) -> anyhow::Result<ChatResponse> {
            let i = self.calls.fetch_add(1, Ordering::SeqCst);
            match self.responses.get(i) {
                Some(Ok(content)) => Ok(ChatResponse {
                    content: content.clone(),
                }),
                Some(Err(error)) => Err(anyhow::anyhow!(error.clone())),
                None => Err(anyhow::anyhow!("out of scripted responses")),
            }
        }

        async fn list_models(&self) -> anyhow::Result<Vec<String>> {
            Ok(vec!["test".to_string()])
        }
    }

    fn client(transport: Arc<SequenceTransport>) -> LlmClient {
        let config = Config {
            llm_max_retries: 2,
            ..Config::default()
        };
        LlmClient::with_transport(transport, &config)
    }

    const VALID: &str = r#"{"operators":[{"name":"read_file","parameters":{"path":"a.py"},"reasoning":"inspect"}],"reasoning":"start by reading"}"#;

    #[tokio::test]
    async fn malformed_then_valid_output_is_recovered_within_budget() {
        let transport = Arc::new(SequenceTransport::new(vec![
            Ok("not json at all".to_string()),
            Ok(VALID.to_string()),
        ]));
        let result: Option<OperatorProposal> = client(transport.clone())
            .structured_query("p", "s", operator_proposal_schema(), None)
            .await;

        assert!(result.is_some());
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn exhausted_retries_return_none_not_error() {
        let transport = Arc::new(SequenceTransport::new(vec![
            Err("connection refused".to_string()),
            Err("connection refused".to_string()),
            Err("connection refused".to_string()),
        ]));
        let result: Option<OperatorProposal> = client(transport.clone())
            .structured_query("p", "s", operator_proposal_schema(), None)
            .await;

        assert!(result.is_none());
        // max_retries = 2 means three attempts total.
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test]
    async fn schema_violation_counts_against_the_budget() {
        // Parses but fails validation: empty operator list.
        let empty = r#"{"operators":[],"reasoning":"nothing"}"#;
        let transport = Arc::new(SequenceTransport::new(vec![
            Ok(empty.to_string()),
            Ok(empty.to_string()),
            Ok(empty.to_string()),
        ]));
        let result: Option<OperatorProposal> = client(transport.clone())
            .structured_query("p", "s", operator_proposal_schema(), None)
            .await;

        assert!(result.is_none());
        assert_eq!(transport.call_count(), 3);
    }
}
