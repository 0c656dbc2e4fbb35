//! HTTP transport to an Ollama-compatible local model server.
//!
//! Non-streaming chat completions with a JSON-schema `format` constraint,
//! plus a list-models call used as the connection check. The reqwest client
//! is built lazily on first use and carries the per-request timeout; retry
//! policy lives in the client wrapper, not here.

use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::domain::ports::{ChatRequest, ChatResponse, LlmTransport};

pub struct OllamaTransport {
    host: String,
    timeout: Duration,
    http: OnceLock<reqwest::Client>,
}

impl OllamaTransport {
    pub fn new(host: impl Into<String>, timeout_secs: f64) -> Self {
        Self {
            host: host.into(),
            timeout: Duration::from_secs_f64(timeout_secs.max(0.1)),
            http: OnceLock::new(),
        }
    }

    fn client(&self) -> &reqwest::Client {
        self.http.get_or_init(|| {
            reqwest::Client::builder()
                .timeout(self.timeout)
                .build()
                .expect("reqwest client construction cannot fail with these options")
        })
    }
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    #[serde(default)]
    models: Vec<OllamaModel>,
}

#[derive(Debug, Deserialize)]
struct OllamaModel {
    name: String,
}

#[async_trait]
impl LlmTransport for OllamaTransport {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let mut body = json!({
            "model": request.model,
            "messages": request.messages,
            "stream": false,
            "options": { "temperature": request.temperature },
        });
        if let Some(format) = &request.format {
            body["format"] = format.clone();
        }

        let response = self
            .client()
            .post(format!("{}/api/chat", self.host))
            .json(&body)
            .send()
            .await
            .context("failed to reach model server")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("model server returned {status}: {body}");
        }

        let parsed: OllamaChatResponse = response
            .json()
            .await
            .context("failed to decode model server response")?;

        Ok(ChatResponse {
            content: parsed.message.content,
        })
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .client()
            .get(format!("{}/api/tags", self.host))
            .send()
            .await
            .context("failed to reach model server")?;

        let parsed: OllamaTagsResponse = response
            .json()
            .await
            .context("failed to decode model list")?;

        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::ChatMessage;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn chat_round_trips_the_message_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": { "role": "assistant", "content": "{\"ok\":true}" }
            })))
            .mount(&server)
            .await;

        let transport = OllamaTransport::new(server.uri(), 5.0);
        let response = transport
            .chat(ChatRequest {
                model: "test".to_string(),
                messages: vec![ChatMessage::user("hello")],
                format: None,
                temperature: 0.3,
            })
            .await
            .unwrap();

        assert_eq!(response.content, "{\"ok\":true}");
    }

    #[tokio::test]
    async fn server_errors_surface_as_transport_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let transport = OllamaTransport::new(server.uri(), 5.0);
        let result = transport
            .chat(ChatRequest {
                model: "test".to_string(),
                messages: vec![],
                format: None,
                temperature: 0.0,
            })
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn list_models_backs_the_connection_check() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "models": [ { "name": "qwen3:8b" } ]
            })))
            .mount(&server)
            .await;

        let transport = OllamaTransport::new(server.uri(), 5.0);
        assert_eq!(transport.list_models().await.unwrap(), vec!["qwen3:8b"]);
    }
}
