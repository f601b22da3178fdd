//! Statement execution and optimization advice.
//!
//! Kept apart from the generation pipeline: a candidate statement only runs
//! when the caller submits it.

pub mod advisor;
pub mod executor;

pub use advisor::{static_tips, tips_from_plan, Advisor, NO_TIPS};
pub use executor::{ExecutionOutcome, Executor};

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::DatabaseClient;
use crate::error::Result;
use crate::sql::{classify, OperationType};

/// Outcome of a statement together with tips for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub outcome: ExecutionOutcome,
    pub operation_type: OperationType,
    pub optimization_tips: String,
}

/// Executes `sql` and, when it succeeds, asks the advisor about it.
pub async fn run_with_advice(
    client: Arc<dyn DatabaseClient>,
    sql: &str,
    database: Option<&str>,
) -> Result<ExecutionReport> {
    let outcome = Executor::new(client.clone()).execute(sql, database).await?;
    let operation_type = classify(sql);
    let optimization_tips = Advisor::new(client)
        .advise(sql.trim(), operation_type, database)
        .await;

    Ok(ExecutionReport {
        outcome,
        operation_type,
        optimization_tips,
    })
}
