//! MySQL database client implementation.
//!
//! Provides the `MySqlClient` struct implementing both `SchemaProvider` and
//! `DatabaseClient` using sqlx. Statements submitted by users go through the
//! text protocol so DDL and server-level commands run unprepared.

use crate::config::ConnectionConfig;
use crate::db::{
    is_system_database, ColumnInfo, DatabaseClient, DatabaseInfo, QueryResult, Row, Schema,
    SchemaProvider, Value,
};
use crate::error::{QuillError, Result};
use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Column as SqlxColumn, Row as SqlxRow, TypeInfo};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Query timeout in seconds.
const QUERY_TIMEOUT_SECS: u64 = 30;

/// Maximum rows to return from a query.
pub const MAX_ROWS: usize = 1000;

/// Maximum number of connection retry attempts.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay between retry attempts (doubles each retry).
const RETRY_BASE_DELAY_MS: u64 = 500;

/// Connections per pool.
const MAX_POOL_CONNECTIONS: u32 = 5;

/// Per-database pools kept open at once.
const MAX_DATABASE_POOLS: usize = 16;

/// MySQL database client.
///
/// Holds one server-level pool and one lazily created pool per database.
#[derive(Debug)]
pub struct MySqlClient {
    options: MySqlConnectOptions,
    server_pool: MySqlPool,
    database_pools: Mutex<HashMap<String, MySqlPool>>,
}

impl MySqlClient {
    /// Connects to the server, retrying transient failures with backoff.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let options = connect_options(config);

        let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);
        let mut attempt = 1;

        loop {
            debug!("Connection attempt {} of {}", attempt, MAX_RETRY_ATTEMPTS);

            let result = pool_options().connect_with(options.clone()).await;

            match result {
                Ok(server_pool) => {
                    debug!("Successfully connected to {}", config.display_string());
                    return Ok(Self {
                        options,
                        server_pool,
                        database_pools: Mutex::new(HashMap::new()),
                    });
                }
                Err(e) if attempt < MAX_RETRY_ATTEMPTS && is_transient_error(&e) => {
                    warn!(
                        "Connection attempt {} failed (transient error), retrying in {:?}",
                        attempt, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(map_connection_error(e, config)),
            }
        }
    }

    /// Returns the pool for a database, creating it on first use.
    ///
    /// Pools are only created for databases that exist, and at most
    /// `MAX_DATABASE_POOLS` are kept.
    async fn pool_for(&self, database: Option<&str>) -> Result<MySqlPool> {
        let Some(database) = database else {
            return Ok(self.server_pool.clone());
        };

        if let Some(pool) = self.database_pools.lock().await.get(database) {
            return Ok(pool.clone());
        }

        if !self.database_exists(database).await? {
            return Err(QuillError::query(format!(
                "ERROR 1049 (42000): Unknown database '{database}'"
            )));
        }

        let mut pools = self.database_pools.lock().await;
        if !pools.contains_key(database) && pools.len() >= MAX_DATABASE_POOLS {
            // Dropping the map's handle closes the pool once in-flight users finish.
            if let Some(evicted) = pools.keys().next().cloned() {
                debug!("Evicting connection pool for database '{}'", evicted);
                pools.remove(&evicted);
            }
        }

        Ok(pools
            .entry(database.to_string())
            .or_insert_with(|| {
                debug!("Creating connection pool for database '{}'", database);
                pool_options().connect_lazy_with(self.options.clone().database(database))
            })
            .clone())
    }

    async fn database_exists(&self, database: &str) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM INFORMATION_SCHEMA.SCHEMATA WHERE SCHEMA_NAME = ?",
        )
        .bind(database)
        .fetch_optional(&self.server_pool)
        .await
        .map_err(|e| QuillError::query(format!("Failed to look up database {database}: {e}")))?;

        Ok(found.is_some())
    }

    async fn load_schema(&self, database: &str) -> Result<Schema> {
        let rows: Vec<(String, String, String)> = sqlx::query_as(
            r#"
            SELECT
                CAST(TABLE_NAME AS CHAR),
                CAST(COLUMN_NAME AS CHAR),
                CAST(DATA_TYPE AS CHAR)
            FROM INFORMATION_SCHEMA.COLUMNS
            WHERE TABLE_SCHEMA = ?
            ORDER BY TABLE_NAME, ORDINAL_POSITION
            "#,
        )
        .bind(database)
        .fetch_all(&self.server_pool)
        .await
        .map_err(|e| QuillError::query(format!("Failed to fetch columns for {database}: {e}")))?;

        Ok(Schema::from_columns(rows))
    }

    async fn load_database_info(&self, database: &str) -> Result<DatabaseInfo> {
        let (table_count, size_mb): (i64, String) = sqlx::query_as(
            r#"
            SELECT
                CAST(COUNT(*) AS SIGNED),
                CAST(COALESCE(ROUND(SUM(DATA_LENGTH + INDEX_LENGTH) / 1024 / 1024, 2), 0) AS CHAR)
            FROM INFORMATION_SCHEMA.TABLES
            WHERE TABLE_SCHEMA = ?
            "#,
        )
        .bind(database)
        .fetch_one(&self.server_pool)
        .await
        .map_err(|e| QuillError::query(format!("Failed to fetch info for {database}: {e}")))?;

        Ok(DatabaseInfo {
            name: database.to_string(),
            table_count: table_count.max(0) as u64,
            size_mb: size_mb.parse().unwrap_or(0.0),
        })
    }

    async fn load_databases(&self) -> Result<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT CAST(SCHEMA_NAME AS CHAR) FROM INFORMATION_SCHEMA.SCHEMATA ORDER BY SCHEMA_NAME",
        )
        .fetch_all(&self.server_pool)
        .await
        .map_err(|e| QuillError::query(format!("Failed to list databases: {e}")))?;

        Ok(names
            .into_iter()
            .filter(|name| !is_system_database(name))
            .collect())
    }
}

fn pool_options() -> MySqlPoolOptions {
    MySqlPoolOptions::new()
        .max_connections(MAX_POOL_CONNECTIONS)
        .acquire_timeout(Duration::from_secs(10))
}

fn connect_options(config: &ConnectionConfig) -> MySqlConnectOptions {
    let mut options = MySqlConnectOptions::new()
        .host(config.host.as_deref().unwrap_or("localhost"))
        .port(config.port);

    if let Some(user) = &config.user {
        options = options.username(user);
    }
    if let Some(password) = &config.password {
        options = options.password(password);
    }

    options
}

#[async_trait]
impl SchemaProvider for MySqlClient {
    async fn get_schema(&self, database: &str) -> Schema {
        match self.load_schema(database).await {
            Ok(schema) => {
                debug!(
                    "Loaded schema for '{}': {} tables",
                    database,
                    schema.tables.len()
                );
                schema
            }
            Err(e) => {
                warn!("Schema lookup for '{}' failed: {}", database, e);
                Schema::default()
            }
        }
    }

    async fn list_databases(&self) -> Vec<String> {
        self.load_databases().await.unwrap_or_else(|e| {
            warn!("Listing databases failed: {}", e);
            Vec::new()
        })
    }

    async fn get_database_info(&self, database: &str) -> DatabaseInfo {
        self.load_database_info(database).await.unwrap_or_else(|e| {
            warn!("Database info for '{}' failed: {}", database, e);
            DatabaseInfo::unavailable(database)
        })
    }

    async fn sample_rows(&self, database: &str, table: &str, limit: usize) -> Result<usize> {
        let sql = format!(
            "SELECT 1 FROM {}.{} LIMIT {}",
            quote_identifier(database),
            quote_identifier(table),
            limit
        );
        let pool = self.pool_for(Some(database)).await?;
        let rows = with_timeout(sqlx::raw_sql(&sql).fetch_all(&pool)).await?;
        Ok(rows.len())
    }
}

#[async_trait]
impl DatabaseClient for MySqlClient {
    async fn fetch(&self, database: Option<&str>, sql: &str) -> Result<QueryResult> {
        let pool = self.pool_for(database).await?;
        let start = Instant::now();

        let result = with_timeout(sqlx::raw_sql(sql).fetch_all(&pool)).await?;

        let execution_time = start.elapsed();

        let columns: Vec<ColumnInfo> = result
            .first()
            .map(|row| {
                row.columns()
                    .iter()
                    .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                    .collect()
            })
            .unwrap_or_default();

        let total_rows = result.len();
        let was_truncated = total_rows > MAX_ROWS;

        if was_truncated {
            warn!(
                "Query returned {} rows, truncating to {} rows",
                total_rows, MAX_ROWS
            );
        }

        let rows: Vec<Row> = result.iter().take(MAX_ROWS).map(convert_row).collect();
        let row_count = rows.len();

        Ok(QueryResult {
            columns,
            rows,
            execution_time,
            row_count,
            total_rows: Some(total_rows),
            was_truncated,
        })
    }

    async fn execute_statement(&self, database: Option<&str>, sql: &str) -> Result<u64> {
        let pool = self.pool_for(database).await?;
        let result = with_timeout(sqlx::raw_sql(sql).execute(&pool)).await?;
        Ok(result.rows_affected())
    }

    async fn explain(&self, database: Option<&str>, sql: &str) -> Result<QueryResult> {
        let statement = sql.trim().trim_end_matches(';');
        self.fetch(database, &format!("EXPLAIN {statement}")).await
    }

    async fn close(&self) -> Result<()> {
        let pools: Vec<MySqlPool> = {
            let mut pools = self.database_pools.lock().await;
            pools.drain().map(|(_, pool)| pool).collect()
        };
        for pool in pools {
            pool.close().await;
        }
        self.server_pool.close().await;
        Ok(())
    }
}

/// Applies the query timeout and maps driver errors.
async fn with_timeout<T, F>(future: F) -> Result<T>
where
    F: std::future::Future<Output = std::result::Result<T, sqlx::Error>>,
{
    tokio::time::timeout(Duration::from_secs(QUERY_TIMEOUT_SECS), future)
        .await
        .map_err(|_| {
            QuillError::query(format!(
                "Query timed out after {QUERY_TIMEOUT_SECS} seconds"
            ))
        })?
        .map_err(|e| QuillError::query(format_query_error(e)))
}

/// Quotes an identifier with backticks, doubling embedded backticks.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Converts a sqlx MySqlRow to our Row type.
fn convert_row(row: &MySqlRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.type_info().name()))
        .collect()
}

/// Converts one column of a text-protocol row.
///
/// Text-protocol values arrive as strings regardless of column type, so they
/// are decoded unchecked and parsed by the reported type name.
fn convert_value(row: &MySqlRow, index: usize, type_name: &str) -> Value {
    let type_name = type_name.to_uppercase();

    if is_binary_type(&type_name) {
        return row
            .try_get_unchecked::<Option<Vec<u8>>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bytes)
            .unwrap_or(Value::Null);
    }

    match row.try_get_unchecked::<Option<String>, _>(index) {
        Ok(Some(text)) => parse_text_value(&type_name, text),
        _ => Value::Null,
    }
}

fn is_binary_type(type_name: &str) -> bool {
    matches!(
        type_name,
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "GEOMETRY"
    )
}

/// Parses a text-protocol value according to its MySQL type name.
fn parse_text_value(type_name: &str, text: String) -> Value {
    let parsed = match type_name {
        "BOOLEAN" => match text.as_str() {
            "0" => Some(Value::Bool(false)),
            "1" => Some(Value::Bool(true)),
            _ => None,
        },
        t if t.contains("INT") || t == "YEAR" => text.parse::<i64>().ok().map(Value::Int),
        "FLOAT" | "DOUBLE" => text.parse::<f64>().ok().map(Value::Float),
        _ => None,
    };

    parsed.unwrap_or(Value::String(text))
}

/// Determines if an error is transient and worth retrying.
fn is_transient_error(error: &sqlx::Error) -> bool {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("access denied")
        || error_str.contains("unknown database")
        || error_str.contains("tls")
        || error_str.contains("ssl")
    {
        return false;
    }

    error_str.contains("connection refused")
        || error_str.contains("timed out")
        || error_str.contains("timeout")
        || error_str.contains("temporarily unavailable")
        || error_str.contains("connection reset")
        || error_str.contains("broken pipe")
        || error_str.contains("too many connections")
}

/// Maps sqlx connection errors to user-friendly messages.
fn map_connection_error(error: sqlx::Error, config: &ConnectionConfig) -> QuillError {
    let host = config.host.as_deref().unwrap_or("localhost");
    let port = config.port;
    let user = config.user.as_deref().unwrap_or("unknown");

    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        QuillError::connection(format!(
            "Cannot connect to {host}:{port}. Check that the server is running."
        ))
    } else if error_str.contains("access denied") {
        QuillError::connection(format!(
            "Authentication failed for user '{user}'. Check your credentials."
        ))
    } else if error_str.contains("tls") || error_str.contains("ssl") {
        QuillError::connection(format!("TLS negotiation with {host}:{port} failed: {error}"))
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        QuillError::connection(format!(
            "Connection to {host}:{port} timed out. The server may be overloaded or unreachable."
        ))
    } else {
        QuillError::connection(error.to_string())
    }
}

/// Formats a query error the way the mysql client prints it.
fn format_query_error(error: sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    match db_error.try_downcast_ref::<sqlx::mysql::MySqlDatabaseError>() {
        Some(mysql_error) => match mysql_error.code() {
            Some(state) => format!(
                "ERROR {} ({}): {}",
                mysql_error.number(),
                state,
                mysql_error.message()
            ),
            None => format!("ERROR {}: {}", mysql_error.number(), mysql_error.message()),
        },
        None => db_error.message().to_string(),
    }
}
