//! Google Gemini client for the `generateContent` REST API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{QuillError, Result};
use crate::llm::http::{ApiTransport, DEFAULT_TIMEOUT_SECS};
use crate::llm::types::{split_system, Message, Role};
use crate::llm::LlmClient;

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    /// Model name, e.g. "gemini-1.5-flash".
    pub model: String,
    pub timeout_secs: u64,
    pub base_url: String,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            base_url: GEMINI_API_URL.to_string(),
        }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn generate_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    transport: ApiTransport,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let transport = ApiTransport::new("Gemini", config.timeout_secs)?;
        Ok(Self { config, transport })
    }
}

/// Builds the request body; assistant turns use the `model` role.
fn build_request(messages: &[Message]) -> GenerateRequest {
    let (system, rest) = split_system(messages);

    GenerateRequest {
        system_instruction: system.map(|text| Content::text(None, text)),
        contents: rest
            .into_iter()
            .map(|m| {
                let role = match m.role {
                    Role::Assistant => "model",
                    Role::User | Role::System => "user",
                };
                Content::text(Some(role), m.content.clone())
            })
            .collect(),
        generation_config: GenerationConfig { temperature: 0.0 },
    }
}

/// Text of the first candidate. Blocked candidates carry no content.
fn candidate_text(response: GenerateResponse) -> Result<String> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| content.parts.into_iter().map(|part| part.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(QuillError::llm("No response from Gemini"));
    }
    Ok(text)
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        debug!(model = %self.config.model, messages = messages.len(), "Sending Gemini request");

        let request = self
            .transport
            .post(&self.config.generate_url())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&build_request(messages));
        let response: GenerateResponse = self.transport.send(request).await?;

        candidate_text(response)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn text(role: Option<&str>, text: String) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![Part { text }],
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_generate_url() {
        let config = GeminiConfig::new("key", "gemini-1.5-flash");
        assert_eq!(
            config.generate_url(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
        );
        assert_eq!(
            config.with_url("http://localhost:9000/").generate_url(),
            "http://localhost:9000/models/gemini-1.5-flash:generateContent"
        );
    }

    #[test]
    fn test_build_request_shape() {
        let messages = vec![
            Message::system("Only output SQL."),
            Message::user("list films"),
            Message::assistant("SELECT * FROM film;"),
        ];

        let json = serde_json::to_value(build_request(&messages)).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "systemInstruction": {"parts": [{"text": "Only output SQL."}]},
                "contents": [
                    {"role": "user", "parts": [{"text": "list films"}]},
                    {"role": "model", "parts": [{"text": "SELECT * FROM film;"}]}
                ],
                "generationConfig": {"temperature": 0.0}
            })
        );
    }

    #[test]
    fn test_candidate_text_joins_parts() {
        let body = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"SELECT "},{"text":"1;"}]}}]}"#;
        let response: GenerateResponse = serde_json::from_str(body).unwrap();
        assert_eq!(candidate_text(response).unwrap(), "SELECT 1;");
    }

    #[test]
    fn test_blocked_candidate_is_an_error() {
        let body = r#"{"candidates":[{"finishReason":"SAFETY"}]}"#;
        let response: GenerateResponse = serde_json::from_str(body).unwrap();
        assert!(candidate_text(response).is_err());
    }
}
