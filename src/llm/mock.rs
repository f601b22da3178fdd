//! Mock LLM client for testing.
//!
//! Provides deterministic responses based on input patterns and records
//! every call so tests can assert which pipeline stages reached the model.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{QuillError, Result};
use crate::llm::prompt::{GUARD_MARKER, REFINE_SYSTEM_PROMPT, REQUEST_LABEL};
use crate::llm::types::{Message, Role};
use crate::llm::LlmClient;

/// Mock LLM client that returns canned responses based on input patterns.
///
/// Clones share the call log.
#[derive(Debug, Clone, Default)]
pub struct MockLlmClient {
    /// Custom response mappings (pattern -> response).
    custom_responses: Vec<(String, String)>,
    /// Patterns that make a call fail.
    failure_patterns: Vec<String>,
    /// Fail every call.
    always_fail: bool,
    /// Prompt text of every call, in order.
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockLlmClient {
    /// Creates a new mock client with default responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mock whose every call fails.
    pub fn failing() -> Self {
        Self {
            always_fail: true,
            ..Self::default()
        }
    }

    /// Adds a custom response mapping.
    ///
    /// When any message contains `pattern` (case-insensitive), the mock
    /// returns `response`. Earlier mappings win.
    pub fn with_response(
        mut self,
        pattern: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        self.custom_responses
            .push((pattern.into().to_lowercase(), response.into()));
        self
    }

    /// Makes calls whose messages contain `pattern` fail.
    pub fn with_failure(mut self, pattern: impl Into<String>) -> Self {
        self.failure_patterns.push(pattern.into().to_lowercase());
        self
    }

    /// Returns the prompt text of every call so far.
    pub fn calls(&self) -> Vec<String> {
        self.log().clone()
    }

    /// Returns the number of calls so far.
    pub fn call_count(&self) -> usize {
        self.log().len()
    }

    /// Returns the number of calls whose prompt contains `pattern`.
    pub fn call_count_matching(&self, pattern: &str) -> usize {
        let pattern = pattern.to_lowercase();
        self.log()
            .iter()
            .filter(|call| call.to_lowercase().contains(&pattern))
            .count()
    }

    fn log(&self) -> MutexGuard<'_, Vec<String>> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Generates a mock response for one call.
    fn mock_response(&self, messages: &[Message]) -> String {
        let prompt = Self::prompt_text(messages).to_lowercase();

        for (pattern, response) in &self.custom_responses {
            if prompt.contains(pattern) {
                return response.clone();
            }
        }

        if prompt.contains(GUARD_MARKER) {
            return "Reasoning: The request only uses tables and columns from the schema.\n\
                    Status: VALID\n\
                    Error:"
                .to_string();
        }

        let user_input = Self::last_user_input(messages);

        if messages
            .iter()
            .any(|m| m.role == Role::System && m.content == REFINE_SYSTEM_PROMPT)
        {
            return user_input;
        }

        Self::default_sql(&Self::request_text(&user_input))
    }

    fn default_sql(request: &str) -> String {
        let request = request.to_lowercase();

        if request.contains("create") && request.contains("table") {
            return "```sql\nCREATE TABLE users (\n  id INT AUTO_INCREMENT PRIMARY KEY,\n  name VARCHAR(100) NOT NULL\n);\n```".to_string();
        }

        if (request.contains("insert") || request.contains("add")) && request.contains("user") {
            return "```sql\nINSERT INTO users (email, name) VALUES ('test@example.com', 'Test User');\n```".to_string();
        }

        if request.contains("update") && request.contains("user") {
            return "```sql\nUPDATE users SET name = 'Updated Name' WHERE id = 1;\n```".to_string();
        }

        if request.contains("delete") && request.contains("user") {
            return "```sql\nDELETE FROM users WHERE id = 1;\n```".to_string();
        }

        if request.contains("count") && request.contains("users") {
            return "```sql\nSELECT COUNT(*) FROM users;\n```".to_string();
        }

        if request.contains("all users") || request.contains("show users") {
            return "```sql\nSELECT * FROM users;\n```".to_string();
        }

        "I don't understand that question. Could you please rephrase it?".to_string()
    }

    fn prompt_text(messages: &[Message]) -> String {
        messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Extracts the last user message content from a message list.
    fn last_user_input(messages: &[Message]) -> String {
        messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }

    /// Narrows a generation prompt down to the request line.
    fn request_text(input: &str) -> String {
        input
            .lines()
            .find_map(|line| line.trim().strip_prefix(REQUEST_LABEL))
            .map(|request| request.trim().to_string())
            .unwrap_or_else(|| input.to_string())
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        let prompt = Self::prompt_text(messages);
        let prompt_lower = prompt.to_lowercase();
        self.log().push(prompt);

        if self.always_fail
            || self
                .failure_patterns
                .iter()
                .any(|pattern| prompt_lower.contains(pattern))
        {
            return Err(QuillError::llm("Mock backend unavailable"));
        }

        Ok(self.mock_response(messages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Schema;
    use crate::llm::prompt::{build_generation_prompt, build_validation_prompt};

    #[tokio::test]
    async fn test_mock_returns_select_all_users() {
        let client = MockLlmClient::new();
        let messages = vec![Message::user("Show me all users")];

        let response = client.complete(&messages).await.unwrap();

        assert!(response.contains("SELECT * FROM users"));
    }

    #[tokio::test]
    async fn test_mock_returns_unknown_response() {
        let client = MockLlmClient::new();
        let messages = vec![Message::user("What is the meaning of life?")];

        let response = client.complete(&messages).await.unwrap();

        assert!(response.contains("don't understand"));
    }

    #[tokio::test]
    async fn test_mock_custom_response() {
        let client = MockLlmClient::new()
            .with_response("custom query", "```sql\nSELECT custom FROM t;\n```");

        let messages = vec![Message::user("Run the Custom Query")];
        let response = client.complete(&messages).await.unwrap();

        assert!(response.contains("SELECT custom FROM t"));
    }

    #[tokio::test]
    async fn test_mock_refine_echoes_request() {
        let client = MockLlmClient::new();
        let messages = vec![
            Message::system(REFINE_SYSTEM_PROMPT),
            Message::user("get rid of the temp table"),
        ];

        let response = client.complete(&messages).await.unwrap();

        assert_eq!(response, "get rid of the temp table");
    }

    #[tokio::test]
    async fn test_mock_guard_defaults_to_valid() {
        let client = MockLlmClient::new();
        let prompt = build_validation_prompt("show all users", &Schema::new(), "app", None);

        let response = client.complete(&[Message::user(prompt)]).await.unwrap();

        assert!(response.contains("Status: VALID"));
    }

    #[tokio::test]
    async fn test_mock_generation_reads_request_line() {
        let client = MockLlmClient::new();
        let prompt = build_generation_prompt("delete user 1", &Schema::new(), None, None);

        let response = client.complete(&[Message::user(prompt)]).await.unwrap();

        assert!(response.contains("DELETE FROM users WHERE id = 1"));
    }

    #[tokio::test]
    async fn test_mock_failures_and_call_log() {
        let client = MockLlmClient::new().with_failure("explode");
        let observer = client.clone();

        assert!(client.complete(&[Message::user("explode now")]).await.is_err());
        assert!(client.complete(&[Message::user("show users")]).await.is_ok());

        assert_eq!(observer.call_count(), 2);
        assert_eq!(observer.call_count_matching("EXPLODE"), 1);
        assert!(MockLlmClient::failing()
            .complete(&[Message::user("anything")])
            .await
            .is_err());
    }
}
