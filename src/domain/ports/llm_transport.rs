//! Port for the out-of-process LLM service.
//!
//! The engine is agnostic to which server sits behind this; it only
//! requires non-streaming responses returnable within the per-request
//! timeout, carrying text that parses against the supplied JSON schema.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    /// JSON schema the server is asked to enforce on the response.
    pub format: Option<serde_json::Value>,
    pub temperature: f32,
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// Raw response text; the client wrapper parses and validates it.
    pub content: String,
}

/// Transport to the model server. Implementations enforce the per-request
/// deadline; the client wrapper owns the retry budget.
#[async_trait]
pub trait LlmTransport: Send + Sync {
    async fn chat(&self, request: ChatRequest) -> anyhow::Result<ChatResponse>;

    /// Lightweight list-models call backing `check_connection`.
    async fn list_models(&self) -> anyhow::Result<Vec<String>>;
}
