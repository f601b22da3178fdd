//! Database abstraction layer for Quill.
//!
//! Two trait seams separate what the pipeline needs (schema snapshots and
//! data-availability probes) from what the executor needs (running
//! statements). Both are implemented by the MySQL client and by the mocks.

mod mock;
mod mysql;
mod schema;
mod types;

pub use mock::{FailingDatabaseClient, MockDatabaseClient, RecordedStatement, DEMO_DATABASE};
pub use mysql::MySqlClient;
pub use schema::{Column, Schema, Table};
pub use types::{ColumnInfo, DatabaseInfo, QueryResult, Row, Value};

use crate::config::ConnectionConfig;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Databases that are never offered to users.
pub const SYSTEM_DATABASES: &[&str] = &["information_schema", "performance_schema", "mysql", "sys"];

/// Returns true for MySQL's built-in schemas.
pub fn is_system_database(name: &str) -> bool {
    SYSTEM_DATABASES
        .iter()
        .any(|system| system.eq_ignore_ascii_case(name))
}

/// Read-only view of database structure used by the generation pipeline.
///
/// Lookups never fail: an unreachable or unknown database yields an empty
/// schema, an empty list or zeroed info, and the failure is logged.
#[async_trait]
pub trait SchemaProvider: Send + Sync {
    /// Returns the tables and columns of the given database.
    async fn get_schema(&self, database: &str) -> Schema;

    /// Lists user databases, excluding system schemas.
    async fn list_databases(&self) -> Vec<String>;

    /// Returns table count and size for the given database.
    async fn get_database_info(&self, database: &str) -> DatabaseInfo;

    /// Returns how many rows (at most `limit`) the table currently holds.
    async fn sample_rows(&self, database: &str, table: &str, limit: usize) -> Result<usize>;
}

/// Statement execution against the database server.
///
/// `database` selects the default schema for the statement; `None` runs it
/// on the server-level connection.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Runs a row-returning statement.
    async fn fetch(&self, database: Option<&str>, sql: &str) -> Result<QueryResult>;

    /// Runs a statement and commits it, returning the affected row count.
    async fn execute_statement(&self, database: Option<&str>, sql: &str) -> Result<u64>;

    /// Returns the execution plan of a statement.
    async fn explain(&self, database: Option<&str>, sql: &str) -> Result<QueryResult>;

    /// Closes all connections.
    async fn close(&self) -> Result<()>;
}

/// One database backend seen through both seams.
#[derive(Clone)]
pub struct Database {
    /// Schema lookups for the pipeline.
    pub schema: Arc<dyn SchemaProvider>,

    /// Statement execution for the executor and advisor.
    pub client: Arc<dyn DatabaseClient>,
}

impl Database {
    /// Wraps a backend implementing both traits.
    pub fn new<C>(backend: C) -> Self
    where
        C: SchemaProvider + DatabaseClient + 'static,
    {
        let backend = Arc::new(backend);
        Self {
            schema: backend.clone(),
            client: backend,
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

/// Connects to the MySQL server described by the configuration.
pub async fn connect(config: &ConnectionConfig) -> Result<Database> {
    let client = MySqlClient::connect(config).await?;
    Ok(Database::new(client))
}
