//! Natural-language to SQL pipeline.
//!
//! One run moves linearly through refinement, the relevance check and
//! generation:
//!
//! ```text
//! Start → Refine → CheckRelevance → Generate → Done
//!                         └────────→ Rejected → Done
//! ```
//!
//! Runs share no state; a [`Pipeline`] only holds shared collaborators and
//! can serve concurrent requests.

mod refiner;
mod relevance;
mod synthesizer;

pub use refiner::{clean_refinement, QueryRefiner};
pub use relevance::{insert_target, parse_verdict, RelevanceValidator, ValidationVerdict};
pub use synthesizer::{extract_sql, strip_fences, SqlSynthesizer};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::db::{Schema, SchemaProvider};
use crate::error::{QuillError, Result};
use crate::llm::ModelGateway;
use crate::sql::OperationType;

/// Prefix of every error returned by [`Pipeline::generate`].
pub const ERROR_PREFIX: &str = "ERROR: ";

/// Database label used in prompts when no database is selected.
const UNNAMED_DATABASE: &str = "database";

const CREATE_WORDS: [&str; 4] = ["create", "make", "build", "new"];
const CREATABLE_OBJECTS: [&str; 5] = ["database", "schema", "table", "tables", "db"];

/// Stage of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    Refine,
    CheckRelevance,
    Generate,
    Rejected,
    Done,
}

/// Why a request produced no statement. These are answers, not failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The request has nothing to do with the database.
    Irrelevant(String),
    /// The request names tables, columns or data the schema lacks.
    InvalidEntity(String),
    /// The generated statement failed the syntax check.
    SyntaxRejected(String),
    /// The model could not produce a statement.
    SynthesisFailed(String),
}

impl Rejection {
    pub fn reason(&self) -> &str {
        match self {
            Self::Irrelevant(reason)
            | Self::InvalidEntity(reason)
            | Self::SyntaxRejected(reason)
            | Self::SynthesisFailed(reason) => reason,
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reason())
    }
}

/// Terminal result of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    Generated {
        sql: String,
        operation_type: OperationType,
    },
    Rejected(Rejection),
}

/// Flattened result of [`Pipeline::generate`].
///
/// Serializes as `{"sql": …, "operation_type": …}` or `{"error": "ERROR: …"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SynthesisResult {
    Sql {
        sql: String,
        operation_type: OperationType,
    },
    Error {
        error: String,
    },
}

impl SynthesisResult {
    /// Creates an error result, adding the stable prefix.
    pub fn error(message: impl fmt::Display) -> Self {
        Self::Error {
            error: format!("{ERROR_PREFIX}{message}"),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Returns the generated statement, if any.
    pub fn sql(&self) -> Option<&str> {
        match self {
            Self::Sql { sql, .. } => Some(sql),
            Self::Error { .. } => None,
        }
    }
}

impl From<PipelineOutcome> for SynthesisResult {
    fn from(outcome: PipelineOutcome) -> Self {
        match outcome {
            PipelineOutcome::Generated {
                sql,
                operation_type,
            } => Self::Sql {
                sql,
                operation_type,
            },
            PipelineOutcome::Rejected(rejection) => Self::error(rejection.reason()),
        }
    }
}

/// Mutable record of one run.
///
/// `rejection_reason` is set exactly when `is_relevant` is false, and a
/// candidate statement only exists for relevant requests.
#[derive(Debug, Clone)]
pub struct PipelineState {
    raw_request: String,
    refined_request: Option<String>,
    database_id: Option<String>,
    schema: Schema,
    is_relevant: bool,
    rejection_reason: Option<String>,
    candidate_sql: Option<String>,
    stage: Stage,
}

impl PipelineState {
    fn new(raw_request: &str, database_id: Option<&str>) -> Self {
        Self {
            raw_request: raw_request.to_string(),
            refined_request: None,
            database_id: database_id.map(str::to_string),
            schema: Schema::new(),
            is_relevant: true,
            rejection_reason: None,
            candidate_sql: None,
            stage: Stage::Start,
        }
    }

    pub fn raw_request(&self) -> &str {
        &self.raw_request
    }

    pub fn refined_request(&self) -> Option<&str> {
        self.refined_request.as_deref()
    }

    pub fn database_id(&self) -> Option<&str> {
        self.database_id.as_deref()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn is_relevant(&self) -> bool {
        self.is_relevant
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    pub fn candidate_sql(&self) -> Option<&str> {
        self.candidate_sql.as_deref()
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    fn advance(&mut self, next: Stage) {
        tracing::debug!(from = ?self.stage, to = ?next, "Pipeline transition");
        self.stage = next;
    }

    fn reject(&mut self, rejection: &Rejection) {
        self.is_relevant = false;
        self.rejection_reason = Some(rejection.reason().to_string());
        self.candidate_sql = None;
        self.advance(Stage::Rejected);
    }

    /// Records the accepted candidate and closes the run.
    fn finish(mut self, sql: String, operation_type: OperationType) -> PipelineOutcome {
        self.candidate_sql = Some(sql.clone());
        self.advance(Stage::Done);
        PipelineOutcome::Generated {
            sql,
            operation_type,
        }
    }
}

/// Returns true when the request asks to create a database, schema or table.
pub fn indicates_creation_intent(request: &str) -> bool {
    let lower = request.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
        .collect();

    words.iter().any(|w| CREATE_WORDS.contains(w))
        && words.iter().any(|w| CREATABLE_OBJECTS.contains(w))
}

/// Orchestrates one request from raw text to a checked candidate statement.
#[derive(Clone)]
pub struct Pipeline {
    schema_provider: Arc<dyn SchemaProvider>,
    refiner: QueryRefiner,
    validator: RelevanceValidator,
    synthesizer: SqlSynthesizer,
    default_database: Option<String>,
}

impl Pipeline {
    /// Creates a pipeline, reading the configured rules file if any.
    pub fn new(
        gateway: Arc<ModelGateway>,
        schema_provider: Arc<dyn SchemaProvider>,
        config: &PipelineConfig,
    ) -> Result<Self> {
        let rules = config.load_rules()?;

        Ok(Self {
            refiner: QueryRefiner::new(gateway.clone()),
            validator: RelevanceValidator::new(
                gateway.clone(),
                schema_provider.clone(),
                config.sample_rows,
            ),
            synthesizer: SqlSynthesizer::new(gateway, rules),
            schema_provider,
            default_database: None,
        })
    }

    /// Sets the database used when a request names none.
    pub fn with_default_database(mut self, database: Option<String>) -> Self {
        self.default_database = database;
        self
    }

    pub fn default_database(&self) -> Option<&str> {
        self.default_database.as_deref()
    }

    /// Runs the pipeline.
    ///
    /// Rejections are part of the outcome. Errors are reserved for a missing
    /// schema and for an unreachable model during refinement.
    pub async fn run(&self, raw: &str, database: Option<&str>) -> Result<PipelineOutcome> {
        let database = database
            .filter(|db| !db.trim().is_empty())
            .or(self.default_database.as_deref());
        let mut state = PipelineState::new(raw, database);
        tracing::debug!(input_len = raw.len(), database = ?database, "Starting pipeline run");

        if let Some(db) = database {
            state.schema = self.schema_provider.get_schema(db).await;
        }

        if state.schema.is_empty() && !indicates_creation_intent(raw) {
            let message = match database {
                Some(db) => format!("No tables found in database '{db}'"),
                None => "No database selected".to_string(),
            };
            tracing::info!("Pipeline stopped: {}", message);
            return Err(QuillError::schema_unavailable(message));
        }

        state.advance(Stage::Refine);
        let refined = self.refiner.refine(raw).await?;
        tracing::debug!(refined = %refined, "Request refined");
        state.refined_request = Some(refined);

        state.advance(Stage::CheckRelevance);
        let verdict = self
            .validator
            .validate(
                state.refined_request().unwrap_or(raw),
                &state.schema,
                database.unwrap_or(UNNAMED_DATABASE),
            )
            .await;

        let rejection = match verdict {
            ValidationVerdict::Valid => None,
            ValidationVerdict::Irrelevant(reason) => Some(Rejection::Irrelevant(reason)),
            ValidationVerdict::InvalidEntity(reason) => Some(Rejection::InvalidEntity(reason)),
        };
        if let Some(rejection) = rejection {
            state.reject(&rejection);
            state.advance(Stage::Done);
            tracing::info!(reason = %rejection, "Pipeline rejected request");
            return Ok(PipelineOutcome::Rejected(rejection));
        }

        state.advance(Stage::Generate);
        let candidate = self
            .synthesizer
            .synthesize(
                state.refined_request().unwrap_or(raw),
                &state.schema,
                database,
            )
            .await;

        match candidate {
            Ok((sql, operation_type)) => {
                tracing::info!(
                    operation = %operation_type,
                    sql_len = sql.len(),
                    "Pipeline generated SQL"
                );
                Ok(state.finish(sql, operation_type))
            }
            Err(rejection) => {
                state.reject(&rejection);
                state.advance(Stage::Done);
                tracing::info!(reason = %rejection, "Pipeline rejected generated SQL");
                Ok(PipelineOutcome::Rejected(rejection))
            }
        }
    }

    /// Runs the pipeline and flattens every failure into an error result.
    pub async fn generate(&self, raw: &str, database: Option<&str>) -> SynthesisResult {
        if raw.trim().is_empty() {
            return SynthesisResult::error("Query cannot be empty");
        }

        match self.run(raw.trim(), database).await {
            Ok(outcome) => outcome.into(),
            Err(e) => {
                tracing::warn!(category = e.category(), "Pipeline failed: {}", e);
                SynthesisResult::error(e)
            }
        }
    }
}
