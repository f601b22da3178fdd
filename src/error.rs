//! Error types for Quill.
//!
//! Defines the main error enum used throughout the application.

use thiserror::Error;

/// Main error type for Quill operations.
#[derive(Error, Debug)]
pub enum QuillError {
    /// Database connection errors (host unreachable, auth failed, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Statement execution errors (syntax errors, constraint violations, etc.)
    #[error("Query error: {0}")]
    Query(String),

    /// Every configured LLM backend failed to produce a completion.
    #[error("LLM error: {0}")]
    Llm(String),

    /// The target database has no usable schema for this request.
    #[error("Schema unavailable: {0}")]
    SchemaUnavailable(String),

    /// A statement failed the structural SQL check.
    #[error("SQL rejected: {0}")]
    SyntaxRejected(String),

    /// Configuration errors (invalid config file, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal application errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl QuillError {
    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a query error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates an LLM error with the given message.
    pub fn llm(msg: impl Into<String>) -> Self {
        Self::Llm(msg.into())
    }

    /// Creates a schema-unavailable error with the given message.
    pub fn schema_unavailable(msg: impl Into<String>) -> Self {
        Self::SchemaUnavailable(msg.into())
    }

    /// Creates a syntax rejection with the given reason.
    pub fn syntax_rejected(msg: impl Into<String>) -> Self {
        Self::SyntaxRejected(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "Connection Error",
            Self::Query(_) => "Execution Failure",
            Self::Llm(_) => "Generation Error",
            Self::SchemaUnavailable(_) => "Schema Unavailable",
            Self::SyntaxRejected(_) => "Syntax Rejected",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// Result type alias using QuillError.
pub type Result<T> = std::result::Result<T, QuillError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_connection() {
        let err = QuillError::connection("Cannot connect to localhost:3306");
        assert_eq!(
            err.to_string(),
            "Connection error: Cannot connect to localhost:3306"
        );
        assert_eq!(err.category(), "Connection Error");
    }

    #[test]
    fn test_error_display_query() {
        let err = QuillError::query("Unknown column 'emal' in 'field list'");
        assert_eq!(
            err.to_string(),
            "Query error: Unknown column 'emal' in 'field list'"
        );
        assert_eq!(err.category(), "Execution Failure");
    }

    #[test]
    fn test_error_display_llm() {
        let err = QuillError::llm("All LLM backends failed");
        assert_eq!(err.to_string(), "LLM error: All LLM backends failed");
        assert_eq!(err.category(), "Generation Error");
    }

    #[test]
    fn test_error_display_schema_unavailable() {
        let err = QuillError::schema_unavailable("database 'shop' has no tables");
        assert_eq!(
            err.to_string(),
            "Schema unavailable: database 'shop' has no tables"
        );
        assert_eq!(err.category(), "Schema Unavailable");
    }

    #[test]
    fn test_error_display_syntax_rejected() {
        let err = QuillError::syntax_rejected("Invalid SQL operation.");
        assert_eq!(err.to_string(), "SQL rejected: Invalid SQL operation.");
        assert_eq!(err.category(), "Syntax Rejected");
    }

    #[test]
    fn test_error_display_config() {
        let err = QuillError::config("missing field 'database' in connections.default");
        assert_eq!(
            err.to_string(),
            "Configuration error: missing field 'database' in connections.default"
        );
        assert_eq!(err.category(), "Configuration Error");
    }

    #[test]
    fn test_error_display_internal() {
        let err = QuillError::internal("unexpected state");
        assert_eq!(err.to_string(), "Internal error: unexpected state");
        assert_eq!(err.category(), "Internal Error");
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<QuillError>();
    }
}
