//! Anthropic Messages API client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{QuillError, Result};
use crate::llm::http::{ApiTransport, ChatMessage, DEFAULT_TIMEOUT_SECS};
use crate::llm::types::{split_system, Message};
use crate::llm::LlmClient;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Statements and verdicts are short.
const DEFAULT_MAX_TOKENS: u32 = 1024;

#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
}

impl AnthropicConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

#[derive(Debug, Clone)]
pub struct AnthropicClient {
    config: AnthropicConfig,
    transport: ApiTransport,
}

impl AnthropicClient {
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        let transport = ApiTransport::new("Anthropic", config.timeout_secs)?;
        Ok(Self { config, transport })
    }

    /// System text travels in its own field; the API rejects a system role.
    fn build_request(&self, messages: &[Message]) -> MessagesRequest {
        let (system, rest) = split_system(messages);
        MessagesRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            temperature: 0.0,
            system,
            messages: rest.into_iter().map(ChatMessage::from).collect(),
        }
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        debug!(model = %self.config.model, messages = messages.len(), "Sending Anthropic request");

        let request = self
            .transport
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&self.build_request(messages));
        let response: MessagesResponse = self.transport.send(request).await?;

        let text = response.text();
        if text.trim().is_empty() {
            return Err(QuillError::llm("No response from Anthropic"));
        }
        Ok(text)
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

impl MessagesResponse {
    /// Concatenates the text blocks, ignoring any other block kinds.
    fn text(self) -> String {
        self.content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_request_moves_system_text() {
        let client =
            AnthropicClient::new(AnthropicConfig::new("sk-ant-test", "claude-sonnet-4-20250514"))
                .unwrap();
        let messages = vec![
            Message::system("You are a strict database guard."),
            Message::user("Delete all films"),
        ];

        let request = client.build_request(&messages);

        assert_eq!(request.system.as_deref(), Some("You are a strict database guard."));
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, "user");
        assert_eq!(request.max_tokens, DEFAULT_MAX_TOKENS);
    }

    #[test]
    fn test_request_without_system_omits_field() {
        let client = AnthropicClient::new(AnthropicConfig::new("k", "m")).unwrap();
        let json = serde_json::to_value(client.build_request(&[Message::user("Hi")])).unwrap();
        assert!(json.get("system").is_none());
    }

    #[test]
    fn test_response_text_ignores_other_blocks() {
        let body = r#"{"content":[{"type":"thinking","thinking":"..."},{"type":"text","text":"SELECT "},{"type":"text","text":"1;"}]}"#;
        let response: MessagesResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.text(), "SELECT 1;");
    }
}
