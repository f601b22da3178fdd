//! SQL generation and extraction from free-form model output.

use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::db::Schema;
use crate::llm::prompt::{build_generation_prompt, GENERATION_SYSTEM_PROMPT};
use crate::llm::{Message, ModelGateway};
use crate::sql::{classify, validate_syntax, OperationType};

use super::Rejection;

/// Statement shapes tried in order; the first match wins. Each match ends at
/// the first semicolon.
const STATEMENT_PATTERNS: [&str; 13] = [
    r"(?is)\bWITH\s+(?:RECURSIVE\s+)?[`\w]+\s+AS\s*\([^;]*;",
    r"(?is)\bINSERT\s+INTO\b[^;]*;",
    r"(?is)\bUPDATE\b[^;]*?\bSET\b[^;]*;",
    r"(?is)\bDELETE\s+FROM\b[^;]*;",
    r"(?is)\bCREATE\s+(?:TEMPORARY\s+)?TABLE\b[^;]*;",
    r"(?is)\bCREATE\s+(?:UNIQUE\s+|FULLTEXT\s+|SPATIAL\s+)?INDEX\b[^;]*;",
    r"(?is)\bALTER\s+TABLE\b[^;]*;",
    r"(?is)\bDROP\s+(?:TEMPORARY\s+)?TABLE\b[^;]*;",
    r"(?is)\bDROP\s+INDEX\b[^;]*;",
    r"(?is)\bTRUNCATE\b[^;]*;",
    r"(?is)\bCREATE\s+(?:DATABASE|SCHEMA)\b[^;]*;",
    r"(?is)\bDROP\s+(?:DATABASE|SCHEMA)\b[^;]*;",
    r"(?is)\bSELECT\b[^;]*;",
];

fn statement_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        STATEMENT_PATTERNS
            .iter()
            .filter_map(|pattern| Regex::new(pattern).ok())
            .collect()
    })
}

/// Generates candidate statements for validated requests.
#[derive(Debug, Clone)]
pub struct SqlSynthesizer {
    gateway: Arc<ModelGateway>,
    rules: Option<String>,
}

impl SqlSynthesizer {
    /// Creates a synthesizer; `rules` replaces the built-in dialect rules.
    pub fn new(gateway: Arc<ModelGateway>, rules: Option<String>) -> Self {
        Self { gateway, rules }
    }

    /// Produces one checked candidate statement.
    ///
    /// A failed model call or a statement failing the syntax check yields a
    /// rejection. Nothing is retried.
    pub async fn synthesize(
        &self,
        request: &str,
        schema: &Schema,
        database: Option<&str>,
    ) -> Result<(String, OperationType), Rejection> {
        let prompt = build_generation_prompt(request, schema, database, self.rules.as_deref());
        tracing::debug!(prompt_len = prompt.len(), "Requesting SQL generation");

        let response = self
            .gateway
            .complete(&[Message::user(prompt)], Some(GENERATION_SYSTEM_PROMPT))
            .await
            .map_err(|e| Rejection::SynthesisFailed(format!("Error generating SQL query: {e}")))?;

        let sql = extract_sql(&response);
        tracing::debug!(response_len = response.len(), sql_len = sql.len(), "Extracted SQL");

        let check = validate_syntax(&sql);
        if !check.accepted {
            return Err(Rejection::SyntaxRejected(
                check
                    .reason
                    .unwrap_or_else(|| "Invalid SQL syntax.".to_string()),
            ));
        }

        let operation_type = classify(&sql);
        Ok((sql, operation_type))
    }
}

/// Returns the body of the first fenced code block, if any.
fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    // Skip the language tag line.
    let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_fence[body_start..];
    let end = body.find("```").unwrap_or(body.len());
    Some(&body[..end])
}

/// Removes markdown fencing from a model answer.
pub fn strip_fences(text: &str) -> String {
    match fenced_block(text) {
        Some(body) => body.trim().to_string(),
        None => text.trim().to_string(),
    }
}

/// Extracts the SQL statement from a model answer.
///
/// Falls back to the whole cleaned answer when no statement shape matches.
pub fn extract_sql(response: &str) -> String {
    let cleaned = strip_fences(response);

    statement_patterns()
        .iter()
        .find_map(|pattern| pattern.find(&cleaned))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or(cleaned)
}
