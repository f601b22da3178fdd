//! Optimization tips for executed statements.
//!
//! Reads get tips from their `EXPLAIN` plan; other statements get fixed
//! advice for their operation type. The advisor never fails.

use std::sync::Arc;

use crate::db::{DatabaseClient, QueryResult, Value};
use crate::sql::OperationType;

/// Separator between tips.
pub const TIP_SEPARATOR: &str = " | ";

/// Returned when no tip applies.
pub const NO_TIPS: &str = "No specific optimization suggestions for this query type.";

const FULL_SCAN_TIP: &str = "Consider adding an index - full table scan detected";
const UNUSED_INDEX_TIP: &str = "Potential index optimization available";
const FILESORT_TIP: &str = "Consider adding index for ORDER BY clause";
const TEMPORARY_TIP: &str = "Consider indexing GROUP BY or DISTINCT columns to avoid a temporary table";

/// Produces optimization tips.
#[derive(Clone)]
pub struct Advisor {
    client: Arc<dyn DatabaseClient>,
}

impl Advisor {
    pub fn new(client: Arc<dyn DatabaseClient>) -> Self {
        Self { client }
    }

    /// Returns tips for `sql`, joined by ` | `.
    pub async fn advise(&self, sql: &str, operation: OperationType, database: Option<&str>) -> String {
        let tips = if operation == OperationType::Select {
            match self.client.explain(database, sql).await {
                Ok(plan) => tips_from_plan(&plan),
                Err(e) => {
                    tracing::debug!("EXPLAIN failed: {}", e);
                    vec![format!("Could not analyze execution plan: {e}")]
                }
            }
        } else {
            static_tips(operation)
                .iter()
                .map(|tip| tip.to_string())
                .collect()
        };

        if tips.is_empty() {
            NO_TIPS.to_string()
        } else {
            tips.join(TIP_SEPARATOR)
        }
    }
}

fn text(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Reads tips from MySQL `EXPLAIN` output. Repeated tips are collapsed.
pub fn tips_from_plan(plan: &QueryResult) -> Vec<String> {
    let mut tips: Vec<String> = Vec::new();
    let mut push = |tip: &str| {
        if !tips.iter().any(|existing| existing == tip) {
            tips.push(tip.to_string());
        }
    };

    for row in 0..plan.rows.len() {
        if text(plan.value(row, "type")).is_some_and(|t| t.eq_ignore_ascii_case("ALL")) {
            push(FULL_SCAN_TIP);
        }

        let key = text(plan.value(row, "key"));
        if key.is_none() && text(plan.value(row, "possible_keys")).is_some() {
            push(UNUSED_INDEX_TIP);
        }

        if let Some(extra) = text(plan.value(row, "Extra")) {
            if extra.contains("filesort") {
                push(FILESORT_TIP);
            }
            if extra.contains("Using temporary") {
                push(TEMPORARY_TIP);
            }
        }
    }

    tips
}

/// Fixed advice for statements that are not explained.
pub fn static_tips(operation: OperationType) -> &'static [&'static str] {
    match operation {
        OperationType::Insert => &["Ensure proper indexing on WHERE clause columns for optimal performance"],
        OperationType::Update | OperationType::Delete => &[
            "Ensure proper indexing on WHERE clause columns for optimal performance",
            "Always use WHERE conditions to avoid unintended mass operations",
            "Consider using transactions for data safety",
        ],
        OperationType::CreateTable => &[
            "Consider adding appropriate indexes on frequently queried columns",
            "Use proper data types and constraints for data integrity",
            "Consider partitioning for large tables",
        ],
        OperationType::CreateIndex => &[
            "Monitor index usage and remove unused indexes",
            "Consider composite indexes for multi-column queries",
        ],
        OperationType::AlterTable => &[
            "Large tables may be rebuilt and locked; run schema changes during low traffic",
            "Review indexes and constraints that depend on changed columns",
        ],
        OperationType::DropTable
        | OperationType::DropIndex
        | OperationType::DropDatabase
        | OperationType::Truncate => &[
            "CAUTION: This operation is irreversible. Ensure you have backups",
            "Consider using transactions and testing in development first",
        ],
        OperationType::Select | OperationType::CreateDatabase | OperationType::Unknown => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ColumnInfo, FailingDatabaseClient, MockDatabaseClient};
    use pretty_assertions::assert_eq;

    fn plan(rows: Vec<Vec<Value>>) -> QueryResult {
        QueryResult::with_data(
            vec![
                ColumnInfo::new("table", "VARCHAR"),
                ColumnInfo::new("type", "VARCHAR"),
                ColumnInfo::new("possible_keys", "VARCHAR"),
                ColumnInfo::new("key", "VARCHAR"),
                ColumnInfo::new("Extra", "VARCHAR"),
            ],
            rows,
        )
    }

    fn string_value(value: &str) -> Value {
        Value::String(value.to_string())
    }

    #[test]
    fn test_tips_from_plan() {
        let plan = plan(vec![
            vec![
                string_value("film"),
                string_value("ALL"),
                Value::Null,
                Value::Null,
                string_value("Using where; Using filesort"),
            ],
            vec![
                string_value("actor"),
                string_value("ALL"),
                string_value("PRIMARY"),
                Value::Null,
                string_value("Using temporary"),
            ],
        ]);

        assert_eq!(
            tips_from_plan(&plan),
            vec![
                FULL_SCAN_TIP.to_string(),
                FILESORT_TIP.to_string(),
                UNUSED_INDEX_TIP.to_string(),
                TEMPORARY_TIP.to_string(),
            ]
        );
    }

    #[test]
    fn test_indexed_plan_has_no_tips() {
        let plan = plan(vec![vec![
            string_value("film"),
            string_value("ref"),
            string_value("idx_title"),
            string_value("idx_title"),
            Value::Null,
        ]]);
        assert!(tips_from_plan(&plan).is_empty());
    }

    #[tokio::test]
    async fn test_advise_select_uses_explain() {
        let db = MockDatabaseClient::new().with_explain_plan(plan(vec![vec![
            string_value("film"),
            string_value("ALL"),
            Value::Null,
            Value::Null,
            Value::Null,
        ]]));
        let advisor = Advisor::new(Arc::new(db.clone()));

        let tips = advisor
            .advise("SELECT * FROM film", OperationType::Select, Some("sakila"))
            .await;

        assert_eq!(tips, FULL_SCAN_TIP);
        assert_eq!(db.statements()[0].sql, "EXPLAIN SELECT * FROM film");
    }

    #[tokio::test]
    async fn test_advise_static_and_empty() {
        let advisor = Advisor::new(Arc::new(MockDatabaseClient::new()));

        let tips = advisor
            .advise("UPDATE t SET a = 1 WHERE id = 2", OperationType::Update, None)
            .await;
        assert_eq!(tips.split(TIP_SEPARATOR).count(), 3);

        assert_eq!(
            advisor
                .advise("CREATE DATABASE shop", OperationType::CreateDatabase, None)
                .await,
            NO_TIPS
        );
        assert_eq!(
            advisor
                .advise("SELECT 1", OperationType::Select, None)
                .await,
            NO_TIPS
        );
    }

    #[tokio::test]
    async fn test_advise_degrades_on_failure() {
        let advisor = Advisor::new(Arc::new(FailingDatabaseClient::default()));

        let tips = advisor
            .advise("SELECT * FROM film", OperationType::Select, Some("sakila"))
            .await;

        assert!(tips.starts_with("Could not analyze execution plan: "));
    }
}
