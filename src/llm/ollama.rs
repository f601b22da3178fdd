//! Client for a local Ollama server.
//!
//! Needs no credentials, which makes it the backend of last resort.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{QuillError, Result};
use crate::llm::http::{ApiTransport, ChatMessage};
use crate::llm::types::Message;
use crate::llm::LlmClient;

/// Local models can take a while to load on first use.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    /// Model tag, e.g. "llama3" or "qwen2.5-coder:7b".
    pub model: String,
    pub timeout_secs: u64,
}

impl OllamaConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            model: model.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }
}

#[derive(Debug, Clone)]
pub struct OllamaClient {
    config: OllamaConfig,
    transport: ApiTransport,
}

impl OllamaClient {
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let transport = ApiTransport::new("Ollama", config.timeout_secs)?;
        Ok(Self { config, transport })
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: messages.iter().map(ChatMessage::from).collect(),
            stream: false,
            options: ChatOptions { temperature: 0.0 },
        };
        debug!(url = %self.config.base_url, model = %self.config.model, "Sending Ollama chat request");

        let request = self.transport.post(&self.config.chat_url()).json(&body);
        let response: ChatResponse = self.transport.send(request).await.map_err(|e| match e {
            QuillError::Llm(msg) if msg.starts_with("Failed to connect") => {
                QuillError::llm(format!("{msg} Is it running? Try: ollama serve"))
            }
            other => other,
        })?;

        Ok(response.message.content)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_config_defaults_and_url() {
        let config = OllamaConfig::new("llama3").with_url("http://gpu-box:11434/");
        assert_eq!(config.model, "llama3");
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.chat_url(), "http://gpu-box:11434/api/chat");
        assert_eq!(OllamaConfig::new("x").base_url, DEFAULT_OLLAMA_URL);
    }

    #[test]
    fn test_request_keeps_system_role_and_disables_streaming() {
        let body = ChatRequest {
            model: "llama3",
            messages: [Message::system("Rewrite the request."), Message::user("rm db")]
                .iter()
                .map(ChatMessage::from)
                .collect(),
            stream: false,
            options: ChatOptions { temperature: 0.0 },
        };

        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["temperature"], 0.0);
    }

    #[test]
    fn test_parse_response() {
        let body = r#"{"model":"llama3","message":{"role":"assistant","content":"SELECT 1;"},"done":true}"#;
        let response: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.message.content, "SELECT 1;");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_llm_error() {
        let client =
            OllamaClient::new(OllamaConfig::new("llama3").with_url("http://127.0.0.1:1")).unwrap();

        let error = client.complete(&[Message::user("hi")]).await.unwrap_err();

        assert!(matches!(error, QuillError::Llm(_)));
    }
}
