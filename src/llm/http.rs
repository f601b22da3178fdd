//! HTTP transport shared by the hosted and local model providers.
//!
//! Every provider posts a JSON body and reads a JSON body back; they differ
//! only in URL, headers and payload shape. Failures become `QuillError::Llm`
//! so the gateway can move on to the next backend.

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::{QuillError, Result};
use crate::llm::types::Message;

/// Request timeout for hosted APIs.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// A configured HTTP client labelled with the service it talks to.
#[derive(Debug, Clone)]
pub struct ApiTransport {
    client: Client,
    service: &'static str,
}

impl ApiTransport {
    pub fn new(service: &'static str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| QuillError::llm(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, service })
    }

    /// Starts a JSON POST to `url`.
    pub fn post(&self, url: &str) -> RequestBuilder {
        self.client
            .post(url)
            .header("Content-Type", "application/json")
    }

    /// Sends the request and decodes a successful response body.
    pub async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let service = self.service;
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                QuillError::llm(format!("{service} request timed out."))
            } else if e.is_connect() {
                let target = e.url().map(|u| format!(" at {}", u.origin().ascii_serialization()));
                QuillError::llm(format!(
                    "Failed to connect to {service}{}.",
                    target.unwrap_or_default()
                ))
            } else {
                QuillError::llm(format!("{service} request failed: {e}"))
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| QuillError::llm(format!("Failed to read {service} response: {e}")))?;
        debug!(service, status = status.as_u16(), body_len = body.len(), "Model API responded");

        if !status.is_success() {
            return Err(api_error(service, status, &body));
        }

        serde_json::from_str(&body)
            .map_err(|e| QuillError::llm(format!("Failed to parse {service} response: {e}")))
    }
}

/// Maps a non-success response to an error, preferring the API's own message.
pub fn api_error(service: &str, status: StatusCode, body: &str) -> QuillError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            QuillError::llm(format!("{service} authentication failed. Check your API key."))
        }
        StatusCode::TOO_MANY_REQUESTS => QuillError::llm(format!("{service} rate limit reached.")),
        _ => match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => QuillError::llm(format!("{service} API error: {}", envelope.message())),
            Err(_) => QuillError::llm(format!("{service} API error ({status}): {}", body.trim())),
        },
    }
}

/// `{"error": {"message": ...}}` from hosted APIs, `{"error": "..."}` from Ollama.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Detailed { message: String },
    Plain(String),
}

impl ErrorEnvelope {
    fn message(&self) -> &str {
        match &self.error {
            ErrorBody::Detailed { message } | ErrorBody::Plain(message) => message,
        }
    }
}

/// Chat message in the `{role, content}` shape most chat APIs accept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl From<&Message> for ChatMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role.as_str().to_string(),
            content: message.content.clone(),
        }
    }
}
