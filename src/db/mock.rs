//! Mock database clients for testing.
//!
//! Provides an in-memory backend for pipeline tests and `--mock-db` demos, and
//! a backend whose every call fails.

use super::{
    is_system_database, ColumnInfo, DatabaseClient, DatabaseInfo, QueryResult, Schema,
    SchemaProvider, Table, Value,
};
use crate::error::{QuillError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Database served by [`MockDatabaseClient::demo`].
pub const DEMO_DATABASE: &str = "sakila";

/// A statement seen by the mock, with the database it targeted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedStatement {
    pub database: Option<String>,
    pub sql: String,
}

/// A mock database client that serves predefined schemas and results.
#[derive(Debug, Clone, Default)]
pub struct MockDatabaseClient {
    schemas: BTreeMap<String, Schema>,
    row_counts: HashMap<(String, String), usize>,
    unreadable_tables: HashSet<(String, String)>,
    fetch_result: Option<QueryResult>,
    explain_plan: Option<QueryResult>,
    rows_affected: u64,
    statements: Arc<Mutex<Vec<RecordedStatement>>>,
}

impl MockDatabaseClient {
    /// Creates a new mock with no databases.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the small movie-rental database used by `--mock-db`.
    pub fn demo() -> Self {
        Self::new()
            .with_table(
                DEMO_DATABASE,
                "actor",
                &[
                    ("actor_id", "smallint"),
                    ("first_name", "varchar"),
                    ("last_name", "varchar"),
                ],
            )
            .with_table(
                DEMO_DATABASE,
                "film",
                &[
                    ("film_id", "smallint"),
                    ("title", "varchar"),
                    ("release_year", "year"),
                    ("rental_rate", "decimal"),
                ],
            )
            .with_table(
                DEMO_DATABASE,
                "category",
                &[("category_id", "tinyint"), ("name", "varchar")],
            )
            .with_table(
                DEMO_DATABASE,
                "film_category",
                &[("film_id", "smallint"), ("category_id", "tinyint")],
            )
            .with_table(
                DEMO_DATABASE,
                "customer",
                &[
                    ("customer_id", "smallint"),
                    ("store_id", "tinyint"),
                    ("first_name", "varchar"),
                    ("last_name", "varchar"),
                    ("email", "varchar"),
                ],
            )
            .with_table(
                DEMO_DATABASE,
                "rental",
                &[
                    ("rental_id", "int"),
                    ("rental_date", "datetime"),
                    ("customer_id", "smallint"),
                ],
            )
            .with_row_count(DEMO_DATABASE, "actor", 200)
            .with_row_count(DEMO_DATABASE, "film", 1000)
            .with_row_count(DEMO_DATABASE, "category", 16)
            .with_row_count(DEMO_DATABASE, "film_category", 1000)
            .with_row_count(DEMO_DATABASE, "customer", 599)
            .with_database("scratch")
    }

    /// Adds an empty database.
    pub fn with_database(mut self, database: &str) -> Self {
        self.schemas.entry(database.to_string()).or_default();
        self
    }

    /// Adds a table with the given `(column, data_type)` pairs.
    pub fn with_table(mut self, database: &str, table: &str, columns: &[(&str, &str)]) -> Self {
        let columns = columns
            .iter()
            .map(|(name, data_type)| super::Column::new(*name, *data_type))
            .collect();
        self.schemas
            .entry(database.to_string())
            .or_default()
            .tables
            .push(Table::new(table, columns));
        self
    }

    /// Sets the number of rows a table holds for availability probes.
    pub fn with_row_count(mut self, database: &str, table: &str, rows: usize) -> Self {
        self.row_counts
            .insert((database.to_string(), table.to_string()), rows);
        self
    }

    /// Makes availability probes of a table fail.
    pub fn with_unreadable_table(mut self, database: &str, table: &str) -> Self {
        self.unreadable_tables
            .insert((database.to_string(), table.to_string()));
        self
    }

    /// Sets the result returned for every fetch.
    pub fn with_fetch_result(mut self, result: QueryResult) -> Self {
        self.fetch_result = Some(result);
        self
    }

    /// Sets the plan returned for every EXPLAIN.
    pub fn with_explain_plan(mut self, plan: QueryResult) -> Self {
        self.explain_plan = Some(plan);
        self
    }

    /// Sets the affected row count reported for every statement.
    pub fn with_rows_affected(mut self, rows: u64) -> Self {
        self.rows_affected = rows;
        self
    }

    /// Returns every statement received so far.
    pub fn statements(&self) -> Vec<RecordedStatement> {
        self.log().clone()
    }

    /// Returns how many statements were received.
    pub fn statement_count(&self) -> usize {
        self.log().len()
    }

    fn log(&self) -> MutexGuard<'_, Vec<RecordedStatement>> {
        self.statements
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, database: Option<&str>, sql: &str) {
        self.log().push(RecordedStatement {
            database: database.map(String::from),
            sql: sql.to_string(),
        });
    }

    fn default_fetch_result(sql: &str) -> QueryResult {
        QueryResult::with_data(
            vec![ColumnInfo::new("result", "VARCHAR")],
            vec![vec![Value::String(format!("Mock result for: {sql}"))]],
        )
        .with_execution_time(Duration::from_millis(1))
    }
}

#[async_trait]
impl SchemaProvider for MockDatabaseClient {
    async fn get_schema(&self, database: &str) -> Schema {
        self.schemas.get(database).cloned().unwrap_or_default()
    }

    async fn list_databases(&self) -> Vec<String> {
        self.schemas
            .keys()
            .filter(|name| !is_system_database(name))
            .cloned()
            .collect()
    }

    async fn get_database_info(&self, database: &str) -> DatabaseInfo {
        match self.schemas.get(database) {
            Some(schema) => DatabaseInfo {
                name: database.to_string(),
                table_count: schema.tables.len() as u64,
                size_mb: 0.02 * schema.tables.len() as f64,
            },
            None => DatabaseInfo::unavailable(database),
        }
    }

    async fn sample_rows(&self, database: &str, table: &str, limit: usize) -> Result<usize> {
        let key = (database.to_string(), table.to_string());
        if self.unreadable_tables.contains(&key) {
            return Err(QuillError::query(format!(
                "SELECT command denied to user for table '{table}'"
            )));
        }
        let rows = self.row_counts.get(&key).copied().unwrap_or(0);
        Ok(rows.min(limit))
    }
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    async fn fetch(&self, database: Option<&str>, sql: &str) -> Result<QueryResult> {
        self.record(database, sql);
        Ok(self
            .fetch_result
            .clone()
            .unwrap_or_else(|| Self::default_fetch_result(sql)))
    }

    async fn execute_statement(&self, database: Option<&str>, sql: &str) -> Result<u64> {
        self.record(database, sql);
        Ok(self.rows_affected)
    }

    async fn explain(&self, database: Option<&str>, sql: &str) -> Result<QueryResult> {
        self.record(database, &format!("EXPLAIN {sql}"));
        Ok(self.explain_plan.clone().unwrap_or_default())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// A database client whose every operation fails.
#[derive(Debug, Clone)]
pub struct FailingDatabaseClient {
    message: String,
}

impl FailingDatabaseClient {
    /// Creates a failing client reporting the given driver message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Default for FailingDatabaseClient {
    fn default() -> Self {
        Self::new("Lost connection to MySQL server during query")
    }
}

#[async_trait]
impl SchemaProvider for FailingDatabaseClient {
    async fn get_schema(&self, _database: &str) -> Schema {
        Schema::default()
    }

    async fn list_databases(&self) -> Vec<String> {
        Vec::new()
    }

    async fn get_database_info(&self, database: &str) -> DatabaseInfo {
        DatabaseInfo::unavailable(database)
    }

    async fn sample_rows(&self, _database: &str, _table: &str, _limit: usize) -> Result<usize> {
        Err(QuillError::query(self.message.clone()))
    }
}

#[async_trait]
impl DatabaseClient for FailingDatabaseClient {
    async fn fetch(&self, _database: Option<&str>, _sql: &str) -> Result<QueryResult> {
        Err(QuillError::query(self.message.clone()))
    }

    async fn execute_statement(&self, _database: Option<&str>, _sql: &str) -> Result<u64> {
        Err(QuillError::query(self.message.clone()))
    }

    async fn explain(&self, _database: Option<&str>, _sql: &str) -> Result<QueryResult> {
        Err(QuillError::query(self.message.clone()))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sakila() -> MockDatabaseClient {
        MockDatabaseClient::new()
            .with_table(
                "sakila",
                "actor",
                &[("actor_id", "smallint"), ("first_name", "varchar")],
            )
            .with_table("sakila", "film", &[("film_id", "smallint")])
            .with_row_count("sakila", "actor", 200)
            .with_database("mysql")
            .with_database("empty_db")
    }

    #[tokio::test]
    async fn test_mock_schema_lookup() {
        let client = sakila();

        let schema = client.get_schema("sakila").await;
        assert_eq!(schema.table_names(), vec!["actor", "film"]);
        assert!(client.get_schema("nope").await.is_empty());
    }

    #[tokio::test]
    async fn test_mock_lists_user_databases() {
        let client = sakila();
        assert_eq!(client.list_databases().await, vec!["empty_db", "sakila"]);
    }

    #[tokio::test]
    async fn test_demo_database() {
        let demo = MockDatabaseClient::demo();

        assert_eq!(demo.list_databases().await, vec!["sakila", "scratch"]);
        assert!(demo.get_schema(DEMO_DATABASE).await.has_table("film_category"));
        assert_eq!(demo.sample_rows(DEMO_DATABASE, "rental", 5).await.unwrap(), 0);
        assert!(demo.get_schema("scratch").await.is_empty());
    }

    #[tokio::test]
    async fn test_mock_sample_rows_respects_limit() {
        let client = sakila().with_unreadable_table("sakila", "film");

        assert_eq!(client.sample_rows("sakila", "actor", 5).await.unwrap(), 5);
        assert_eq!(client.sample_rows("empty_db", "x", 5).await.unwrap(), 0);
        assert!(client.sample_rows("sakila", "film", 5).await.is_err());
    }

    #[tokio::test]
    async fn test_mock_records_statements() {
        let client = sakila().with_rows_affected(3);

        let result = client.fetch(Some("sakila"), "SELECT 1").await.unwrap();
        assert_eq!(result.row_count, 1);

        let affected = client
            .execute_statement(None, "CREATE DATABASE shop")
            .await
            .unwrap();
        assert_eq!(affected, 3);

        assert_eq!(
            client.statements(),
            vec![
                RecordedStatement {
                    database: Some("sakila".to_string()),
                    sql: "SELECT 1".to_string(),
                },
                RecordedStatement {
                    database: None,
                    sql: "CREATE DATABASE shop".to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_failing_client() {
        let client = FailingDatabaseClient::default();

        assert!(client.fetch(None, "SELECT 1").await.is_err());
        assert!(client.get_schema("sakila").await.is_empty());
        assert_eq!(client.get_database_info("sakila").await.table_count, 0);
    }
}
