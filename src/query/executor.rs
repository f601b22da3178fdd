//! Statement execution.
//!
//! Every statement passes the syntax gate again before it reaches the
//! database, whether it came from the pipeline or was typed by hand.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::db::{DatabaseClient, QueryResult};
use crate::error::{QuillError, Result};
use crate::sql::{classify, validate_syntax, OperationType};

/// Status reported for committed statements.
pub const SUCCESS_STATUS: &str = "Success";

/// What running a statement produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// Rows returned by a read.
    Rows(QueryResult),
    /// Summary of a committed write or DDL statement.
    Summary {
        operation: OperationType,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rows_affected: Option<u64>,
        status: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl ExecutionOutcome {
    fn summary(operation: OperationType, rows_affected: u64) -> Self {
        if operation.reports_rows_affected() {
            Self::Summary {
                operation,
                rows_affected: Some(rows_affected),
                status: SUCCESS_STATUS.to_string(),
                message: None,
            }
        } else {
            Self::Summary {
                operation,
                rows_affected: None,
                status: SUCCESS_STATUS.to_string(),
                message: Some(format!("{operation} operation completed successfully")),
            }
        }
    }

    /// Returns the rows of a read.
    pub fn rows(&self) -> Option<&QueryResult> {
        match self {
            Self::Rows(result) => Some(result),
            Self::Summary { .. } => None,
        }
    }
}

/// Runs checked statements against the database.
#[derive(Clone)]
pub struct Executor {
    client: Arc<dyn DatabaseClient>,
}

impl Executor {
    pub fn new(client: Arc<dyn DatabaseClient>) -> Self {
        Self { client }
    }

    /// Runs `sql` against `database`.
    ///
    /// Reads return rows; everything else is committed and summarized.
    /// Database creation and removal run on the server-level connection.
    pub async fn execute(&self, sql: &str, database: Option<&str>) -> Result<ExecutionOutcome> {
        let check = validate_syntax(sql);
        if !check.accepted {
            let reason = check
                .reason
                .unwrap_or_else(|| "Invalid SQL syntax.".to_string());
            tracing::warn!("Refusing to execute statement: {}", reason);
            return Err(QuillError::syntax_rejected(reason));
        }

        let operation = classify(sql);
        let target = if operation.is_server_level() {
            None
        } else {
            database
        };
        let sql = sql.trim();

        tracing::debug!(operation = %operation, database = ?target, sql_len = sql.len(), "Executing statement");
        let start = Instant::now();

        let outcome = if operation.is_read() {
            let result = self
                .client
                .fetch(target, sql)
                .await
                .map_err(into_execution_failure)?;
            if result.was_truncated {
                tracing::warn!("Result truncated to {} rows", result.row_count);
            }
            ExecutionOutcome::Rows(result)
        } else {
            let rows_affected = self
                .client
                .execute_statement(target, sql)
                .await
                .map_err(into_execution_failure)?;
            ExecutionOutcome::summary(operation, rows_affected)
        };

        tracing::info!(
            operation = %operation,
            duration_ms = start.elapsed().as_millis(),
            "Statement executed"
        );
        Ok(outcome)
    }
}

/// Reports any database failure during execution as an execution failure.
fn into_execution_failure(error: QuillError) -> QuillError {
    match error {
        QuillError::Query(_) => error,
        other => QuillError::query(other.to_string()),
    }
}
