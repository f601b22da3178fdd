//! Chat-completions client for OpenAI and Groq.
//!
//! Groq serves the same request and response shape under its own URL, so
//! one client covers both; only the endpoint and service label differ.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{QuillError, Result};
use crate::llm::http::{ApiTransport, ChatMessage, DEFAULT_TIMEOUT_SECS};
use crate::llm::types::Message;
use crate::llm::LlmClient;

pub const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const GROQ_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Settings for one chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    /// Model name, e.g. "gpt-4o" or "llama-3.1-8b-instant".
    pub model: String,
    pub timeout_secs: u64,
    pub url: String,
    /// Label used in logs and error messages.
    pub service: &'static str,
}

impl OpenAiConfig {
    /// Targets the OpenAI endpoint.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            url: OPENAI_API_URL.to_string(),
            service: "OpenAI",
        }
    }

    /// Targets Groq's OpenAI-compatible endpoint.
    pub fn groq(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            url: GROQ_API_URL.to_string(),
            service: "Groq",
            ..Self::new(api_key, model)
        }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Points the client at a proxy or self-hosted compatible server.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    config: OpenAiConfig,
    transport: ApiTransport,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let transport = ApiTransport::new(config.service, config.timeout_secs)?;
        Ok(Self { config, transport })
    }

    /// Deterministic sampling: the same request should yield the same SQL.
    fn build_request(&self, messages: &[Message]) -> CompletionRequest {
        CompletionRequest {
            model: self.config.model.clone(),
            messages: messages.iter().map(ChatMessage::from).collect(),
            temperature: 0.0,
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        let service = self.config.service;
        debug!(service, model = %self.config.model, messages = messages.len(), "Sending completion request");

        let request = self
            .transport
            .post(&self.config.url)
            .bearer_auth(&self.config.api_key)
            .json(&self.build_request(messages));
        let response: CompletionResponse = self.transport.send(request).await?;

        response
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| QuillError::llm(format!("No response from {service}")))
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}
