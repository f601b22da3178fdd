//! Shallow structural check on candidate statements.
//!
//! Uses the sqlparser MySQL tokenizer rather than the full parser: model
//! output routinely contains dialect features the parser does not cover, so
//! only tokenization and the leading keyword are checked.

use sqlparser::dialect::MySqlDialect;
use sqlparser::tokenizer::{Token, Tokenizer};

use super::operation::strip_leading_comments;

/// Leading keywords accepted for execution.
pub const ALLOWED_KEYWORDS: [&str; 9] = [
    "SELECT", "INSERT", "UPDATE", "DELETE", "CREATE", "ALTER", "DROP", "TRUNCATE", "WITH",
];

const INVALID_SYNTAX: &str = "Invalid SQL syntax.";
const INVALID_OPERATION: &str = "Invalid SQL operation.";
const MULTIPLE_STATEMENTS: &str = "Only one SQL statement is allowed.";

/// Outcome of a syntax check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxCheck {
    /// Whether the statement may proceed.
    pub accepted: bool,
    /// Why the statement was rejected.
    pub reason: Option<String>,
}

impl SyntaxCheck {
    fn accept() -> Self {
        Self {
            accepted: true,
            reason: None,
        }
    }

    fn reject(reason: impl Into<String>) -> Self {
        Self {
            accepted: false,
            reason: Some(reason.into()),
        }
    }
}

/// Checks that `sql` is a single statement that tokenizes and starts with an
/// allowed keyword.
pub fn validate_syntax(sql: &str) -> SyntaxCheck {
    // The MySQL tokenizer reads `#` as an operator, not a comment.
    let sql = strip_leading_comments(sql);
    let dialect = MySqlDialect {};
    let tokens = match Tokenizer::new(&dialect, sql).tokenize() {
        Ok(tokens) => tokens,
        Err(e) => {
            tracing::debug!("Tokenizer rejected statement: {}", e);
            return SyntaxCheck::reject(INVALID_SYNTAX);
        }
    };

    if statement_count(&tokens) > 1 {
        return SyntaxCheck::reject(MULTIPLE_STATEMENTS);
    }

    // Whitespace tokens carry comments too.
    let first = tokens
        .iter()
        .find(|token| !matches!(token, Token::Whitespace(_) | Token::SemiColon));

    match first {
        None => SyntaxCheck::reject(INVALID_SYNTAX),
        Some(Token::Word(word))
            if word.quote_style.is_none()
                && ALLOWED_KEYWORDS.contains(&word.value.to_uppercase().as_str()) =>
        {
            SyntaxCheck::accept()
        }
        Some(_) => SyntaxCheck::reject(INVALID_OPERATION),
    }
}

/// Counts semicolon-separated groups holding anything besides whitespace.
fn statement_count(tokens: &[Token]) -> usize {
    tokens
        .split(|token| matches!(token, Token::SemiColon))
        .filter(|group| group.iter().any(|token| !matches!(token, Token::Whitespace(_))))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rejected_with(sql: &str) -> Option<String> {
        let check = validate_syntax(sql);
        assert!(!check.accepted, "expected rejection for {sql:?}");
        check.reason
    }

    #[test]
    fn test_accepts_each_allowed_keyword() {
        for sql in [
            "SELECT * FROM users;",
            "insert into users (name) values ('a')",
            "Update users SET name = 'b' WHERE id = 1",
            "DELETE FROM users WHERE id = 1",
            "CREATE TABLE t (id INT)",
            "ALTER TABLE t ADD COLUMN c INT",
            "DROP TABLE t",
            "TRUNCATE TABLE t",
            "WITH c AS (SELECT 1) SELECT * FROM c",
        ] {
            assert!(validate_syntax(sql).accepted, "expected acceptance for {sql:?}");
        }
    }

    #[test]
    fn test_skips_leading_comments() {
        assert!(validate_syntax("-- list users\nSELECT * FROM users").accepted);
        assert!(validate_syntax("/* generated */ SELECT 1").accepted);
        assert!(validate_syntax("# note\nSELECT 1").accepted);
    }

    #[test]
    fn test_rejects_empty_input() {
        assert_eq!(rejected_with(""), Some(INVALID_SYNTAX.to_string()));
        assert_eq!(rejected_with("  ;; "), Some(INVALID_SYNTAX.to_string()));
        assert_eq!(rejected_with("-- nothing here"), Some(INVALID_SYNTAX.to_string()));
    }

    #[test]
    fn test_rejects_other_operations() {
        assert_eq!(rejected_with("hello world"), Some(INVALID_OPERATION.to_string()));
        assert_eq!(
            rejected_with("GRANT SELECT ON film TO reporting"),
            Some(INVALID_OPERATION.to_string())
        );
        assert_eq!(rejected_with("SHOW TABLES"), Some(INVALID_OPERATION.to_string()));
        assert_eq!(rejected_with("`select` FROM t"), Some(INVALID_OPERATION.to_string()));
    }

    #[test]
    fn test_rejects_chained_statements() {
        assert_eq!(
            rejected_with("SELECT * FROM users; DROP TABLE users;"),
            Some(MULTIPLE_STATEMENTS.to_string())
        );
        assert_eq!(
            rejected_with("DELETE FROM t;\n-- then\nTRUNCATE t"),
            Some(MULTIPLE_STATEMENTS.to_string())
        );
        assert!(validate_syntax("SELECT 1;;  ").accepted);
        assert!(validate_syntax("SELECT ';' AS sep;").accepted);
    }

    #[test]
    fn test_rejects_untokenizable_input() {
        assert_eq!(
            rejected_with("SELECT 'unterminated"),
            Some(INVALID_SYNTAX.to_string())
        );
    }
}
