//! Execution and advice tests against the mock database.

use std::sync::Arc;

use db_quill::db::{
    ColumnInfo, FailingDatabaseClient, MockDatabaseClient, QueryResult, RecordedStatement, Value,
    DEMO_DATABASE,
};
use db_quill::error::QuillError;
use db_quill::query::{run_with_advice, ExecutionOutcome, NO_TIPS};
use db_quill::sql::OperationType;
use pretty_assertions::assert_eq;

fn full_scan_plan() -> QueryResult {
    QueryResult::with_data(
        vec![
            ColumnInfo::new("table", "VARCHAR"),
            ColumnInfo::new("type", "VARCHAR"),
            ColumnInfo::new("possible_keys", "VARCHAR"),
            ColumnInfo::new("key", "VARCHAR"),
            ColumnInfo::new("Extra", "VARCHAR"),
        ],
        vec![vec![
            Value::String("film".to_string()),
            Value::String("ALL".to_string()),
            Value::Null,
            Value::Null,
            Value::String("Using where; Using filesort".to_string()),
        ]],
    )
}

#[tokio::test]
async fn test_select_returns_rows_and_plan_tips() {
    let db = MockDatabaseClient::demo().with_explain_plan(full_scan_plan());

    let report = run_with_advice(
        Arc::new(db.clone()),
        "SELECT title FROM film ORDER BY length;",
        Some(DEMO_DATABASE),
    )
    .await
    .unwrap();

    assert_eq!(report.operation_type, OperationType::Select);
    assert!(report.outcome.rows().is_some());
    assert_eq!(
        report.optimization_tips,
        "Consider adding an index - full table scan detected | Consider adding index for ORDER BY clause"
    );
    assert_eq!(
        db.statements(),
        vec![
            RecordedStatement {
                database: Some(DEMO_DATABASE.to_string()),
                sql: "SELECT title FROM film ORDER BY length;".to_string(),
            },
            RecordedStatement {
                database: Some(DEMO_DATABASE.to_string()),
                sql: "EXPLAIN SELECT title FROM film ORDER BY length;".to_string(),
            },
        ]
    );
}

#[tokio::test]
async fn test_update_reports_rows_affected() {
    let db = MockDatabaseClient::demo().with_rows_affected(3);

    let report = run_with_advice(
        Arc::new(db),
        "UPDATE customer SET active = 0 WHERE store_id = 2;",
        Some(DEMO_DATABASE),
    )
    .await
    .unwrap();

    match report.outcome {
        ExecutionOutcome::Summary {
            operation,
            rows_affected,
            status,
            message,
        } => {
            assert_eq!(operation, OperationType::Update);
            assert_eq!(rows_affected, Some(3));
            assert_eq!(status, "Success");
            assert_eq!(message, None);
        }
        other => panic!("expected a summary, got {other:?}"),
    }
    assert!(report
        .optimization_tips
        .contains("Always use WHERE conditions"));
}

#[tokio::test]
async fn test_create_database_runs_without_selected_database() {
    let db = MockDatabaseClient::demo();

    let report = run_with_advice(
        Arc::new(db.clone()),
        "CREATE DATABASE analytics;",
        Some(DEMO_DATABASE),
    )
    .await
    .unwrap();

    match report.outcome {
        ExecutionOutcome::Summary { message, .. } => {
            assert_eq!(
                message.as_deref(),
                Some("CREATE_DATABASE operation completed successfully")
            );
        }
        other => panic!("expected a summary, got {other:?}"),
    }
    assert_eq!(report.optimization_tips, NO_TIPS);
    assert_eq!(db.statements()[0].database, None);
}

#[tokio::test]
async fn test_unsupported_statement_never_reaches_database() {
    let db = MockDatabaseClient::demo();

    let err = run_with_advice(Arc::new(db.clone()), "GRANT ALL ON *.* TO 'x';", None)
        .await
        .unwrap_err();

    assert!(matches!(err, QuillError::SyntaxRejected(_)));
    assert_eq!(db.statement_count(), 0);
}

#[tokio::test]
async fn test_driver_failure_is_an_execution_error() {
    let err = run_with_advice(
        Arc::new(FailingDatabaseClient::new("Table 'sakila.nope' doesn't exist")),
        "SELECT * FROM nope;",
        Some(DEMO_DATABASE),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, QuillError::Query(_)));
    assert!(err.to_string().contains("doesn't exist"));
}

#[tokio::test]
async fn test_report_serializes_for_json_output() {
    let report = run_with_advice(
        Arc::new(MockDatabaseClient::demo()),
        "DROP TABLE rental;",
        Some(DEMO_DATABASE),
    )
    .await
    .unwrap();

    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["operation_type"], "DROP_TABLE");
    assert_eq!(json["outcome"]["summary"]["status"], "Success");
    assert!(json["optimization_tips"]
        .as_str()
        .unwrap()
        .starts_with("CAUTION"));
}
