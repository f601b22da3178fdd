//! Semantic guard deciding whether a request can be answered from the schema.
//!
//! Parsing of the model's answer is isolated in [`parse_verdict`] so that the
//! tolerant rules can be tested without a model.

use std::sync::Arc;

use crate::db::{Schema, SchemaProvider};
use crate::llm::prompt::{build_validation_prompt, VALIDATION_SYSTEM_PROMPT};
use crate::llm::{Message, ModelGateway};

const IRRELEVANT_PREFIX: &str = "I cannot answer this.";
const IRRELEVANT_DEFAULT: &str = "Query is unrelated to the database.";
const INVALID_ENTITY_PREFIX: &str = "I cannot generate SQL.";
const INVALID_ENTITY_DEFAULT: &str = "The requested specific data type is missing from the schema.";

/// Words that mark a request as adding rows.
const INSERT_WORDS: [&str; 4] = ["insert", "add", "register", "put"];
const INSERT_PHRASES: [&str; 2] = ["new row", "new record"];

/// Decision of the relevance check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationVerdict {
    Valid,
    Irrelevant(String),
    InvalidEntity(String),
}

impl ValidationVerdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// Status keyword read from the model's answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Valid,
    Irrelevant,
    InvalidEntity,
}

/// Classifies refined requests as valid, irrelevant or naming missing entities.
#[derive(Clone)]
pub struct RelevanceValidator {
    gateway: Arc<ModelGateway>,
    schema_provider: Arc<dyn SchemaProvider>,
    sample_rows: usize,
}

impl RelevanceValidator {
    pub fn new(
        gateway: Arc<ModelGateway>,
        schema_provider: Arc<dyn SchemaProvider>,
        sample_rows: usize,
    ) -> Self {
        Self {
            gateway,
            schema_provider,
            sample_rows,
        }
    }

    /// Checks the request against the schema.
    ///
    /// Never fails: when the model cannot be reached the request is let
    /// through.
    pub async fn validate(&self, request: &str, schema: &Schema, database: &str) -> ValidationVerdict {
        let availability = match insert_target(request, schema) {
            Some(target) => Some(self.probe_availability(schema, database, target).await),
            None => None,
        };

        let prompt = build_validation_prompt(request, schema, database, availability.as_deref());
        tracing::debug!(
            prompt_len = prompt.len(),
            probed = availability.is_some(),
            "Checking request relevance"
        );

        match self
            .gateway
            .complete(&[Message::user(prompt)], Some(VALIDATION_SYSTEM_PROMPT))
            .await
        {
            Ok(response) => parse_verdict(&response),
            Err(e) => {
                tracing::warn!("Relevance check failed, proceeding anyway: {}", e);
                ValidationVerdict::Valid
            }
        }
    }

    /// Builds the data-availability note for every table except `target`.
    async fn probe_availability(&self, schema: &Schema, database: &str, target: &str) -> String {
        let mut lines = Vec::new();

        for table in schema.table_names() {
            if table.eq_ignore_ascii_case(target) {
                continue;
            }

            let state = match self
                .schema_provider
                .sample_rows(database, table, self.sample_rows)
                .await
            {
                Ok(0) => "EMPTY",
                Ok(_) => "has rows",
                Err(e) => {
                    tracing::debug!(table, "Availability probe failed: {}", e);
                    "unknown"
                }
            };
            lines.push(format!("- {table}: {state}"));
        }

        lines.join("\n")
    }
}

/// Returns the schema table an insert-type request targets, if any.
pub fn insert_target<'a>(request: &str, schema: &'a Schema) -> Option<&'a str> {
    let lower = request.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
        .collect();

    let wants_insert = words.iter().any(|w| INSERT_WORDS.contains(w))
        || INSERT_PHRASES.iter().any(|phrase| lower.contains(phrase));
    if !wants_insert {
        return None;
    }

    schema.table_names().into_iter().find(|table| {
        let table = table.to_lowercase();
        let singular = table.strip_suffix('s').unwrap_or(&table);
        words.iter().any(|w| *w == table || *w == singular)
    })
}

/// Normalizes a line for label matching: drops markdown bullets and emphasis.
fn strip_decoration(line: &str) -> &str {
    line.trim_matches(|c: char| c.is_whitespace() || matches!(c, '*' | '-' | '#' | '_' | '>'))
}

/// Returns the value after `label` (case-insensitive) on a decorated line.
fn labeled_value<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let line = strip_decoration(line);
    let head = line.get(..label.len())?;
    if !head.eq_ignore_ascii_case(label) {
        return None;
    }
    Some(strip_decoration(&line[label.len()..]))
}

fn contains_word(haystack: &str, word: &str) -> bool {
    haystack
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .any(|w| w == word)
}

/// Reads statuses named in a fragment, in priority order.
fn statuses_in(text: &str) -> Vec<Status> {
    let upper = text.to_uppercase().replace("INVALID ENTITY", "INVALID_ENTITY");
    let mut found = Vec::new();
    if contains_word(&upper, "INVALID_ENTITY") {
        found.push(Status::InvalidEntity);
    }
    if contains_word(&upper, "IRRELEVANT") {
        found.push(Status::Irrelevant);
    }
    if contains_word(&upper, "VALID") {
        found.push(Status::Valid);
    }
    found
}

/// Parses the guard's answer into a verdict.
///
/// The first `Status:` line decides; a value naming several statuses (an
/// echoed template) counts as no decision. When there is no status line, or
/// its value names no status, the whole answer is scanned. Undecided answers
/// are valid.
pub fn parse_verdict(output: &str) -> ValidationVerdict {
    let status_line = output.lines().find_map(|line| labeled_value(line, "status:"));
    let error = output
        .lines()
        .find_map(|line| labeled_value(line, "error:"))
        .filter(|e| {
            !e.is_empty()
                && !e.eq_ignore_ascii_case("none")
                && !e.eq_ignore_ascii_case("n/a")
        });

    let status = match status_line.map(statuses_in).as_deref() {
        Some([single]) => Some(*single),
        // Several statuses on the line means the template was echoed back.
        Some([_, _, ..]) => None,
        Some([]) | None => statuses_in(output).first().copied(),
    };

    match status {
        Some(Status::Irrelevant) => ValidationVerdict::Irrelevant(format!(
            "{IRRELEVANT_PREFIX} {}",
            error.unwrap_or(IRRELEVANT_DEFAULT)
        )),
        Some(Status::InvalidEntity) => ValidationVerdict::InvalidEntity(format!(
            "{INVALID_ENTITY_PREFIX} {}",
            error.unwrap_or(INVALID_ENTITY_DEFAULT)
        )),
        Some(Status::Valid) | None => ValidationVerdict::Valid,
    }
}
