//! Prompt construction for LLM requests.
//!
//! Holds the fixed instructions for the three model calls of a pipeline run
//! (refinement, relevance check, generation) and fills in schema context.

use crate::db::Schema;

/// Label that introduces the user's request in the generation prompt.
pub const REQUEST_LABEL: &str = "User Request:";

/// Phrase that identifies the relevance-check prompt.
pub const GUARD_MARKER: &str = "strict database guard";

/// System instruction for the refinement call.
pub const REFINE_SYSTEM_PROMPT: &str = r#"You rewrite database requests into precise technical terminology. Do not write SQL.

Rules:
- Keep the user's intent, table names, column names and literal values exactly.
- "remove", "delete" or "get rid of" a database becomes "drop the database <name>".
- "remove" or "delete" a table becomes "drop the table <name>".
- "add a record", "put in" or "register" becomes "insert a new row into <table>".
- "change" or "set" values becomes "update <column> in <table>".
- "wipe" or "clear out" a table becomes "truncate the table <name>".
- Resolve vague quantities ("a few", "top") into explicit limits only when the request states them.

Respond with the rewritten request only, on a single line."#;

/// System instruction for the relevance check.
pub const VALIDATION_SYSTEM_PROMPT: &str =
    "You are a validation system. You must reason step-by-step before deciding.";

const VALIDATION_TEMPLATE: &str = r#"You are a strict database guard. Analyze the user request against the provided database schema.

Database: {database}
Schema:
{schema}
{availability}
User Request: "{request}"

INSTRUCTIONS:
1. IDENTIFY OPERATION: Is this SELECT, INSERT, UPDATE, DELETE, or CREATE/DROP?

2. IF SELECT / UPDATE / DELETE:
   - Check that the requested tables and columns exist in the schema.
   - Match specific kinds strictly (e.g. "Test" vs "ODI", "Home" vs "Work").
   - Reject if the specific column or table is missing.

3. IF INSERT:
   - Check that the target table and target columns exist.
   - Allow new data values ("insert a player named X" is valid even if X is not in the database).
   - If a required related row must come from a table listed as EMPTY above, the request cannot be satisfied: reject it as INVALID_ENTITY and say which table has no rows.

4. IF CREATE / DROP:
   - Allow creating new databases, tables, columns and indexes.
   - Allow dropping existing objects.
   - Do not reject because the object does not exist yet.

5. IRRELEVANT means the request has nothing to do with this database (small talk, general knowledge, other systems).

OUTPUT FORMAT (follow exactly):
Reasoning: [Explain your thought process. Identify the operation type first.]
Status: [VALID | IRRELEVANT | INVALID_ENTITY]
Error: [If invalid, the error message. Otherwise leave empty.]"#;

/// System instruction for the generation call.
pub const GENERATION_SYSTEM_PROMPT: &str = "You are an expert MySQL database developer. You can generate any type of SQL statement including SELECT, INSERT, UPDATE, DELETE, CREATE TABLE, ALTER TABLE, DROP TABLE and CREATE INDEX. Always provide complete, syntactically correct and efficient statements.";

/// Dialect rules used when no rules file is configured.
pub const DEFAULT_DIALECT_RULES: &str = r#"- Use MySQL 8 syntax and data types (VARCHAR, INT, DECIMAL, DATETIME, TEXT).
- Quote identifiers that clash with reserved words using backticks.
- Include appropriate constraints (PRIMARY KEY, FOREIGN KEY, NOT NULL, UNIQUE) in CREATE TABLE.
- UPDATE and DELETE must carry a WHERE clause unless the request explicitly targets every row.
- MySQL cannot modify a table and select from it in the same statement; wrap such subqueries in a derived table.
- Foreign key values for INSERT must come from a SELECT on the referenced table, never from invented ids.
- Return exactly one statement, ending with a semicolon."#;

const GENERATION_TEMPLATE: &str = r#"Convert the following natural language request into one complete MySQL statement.

You can generate any kind of statement:
- SELECT with JOINs, WHERE, GROUP BY, ORDER BY and window functions
- INSERT, UPDATE, DELETE
- CREATE TABLE, CREATE INDEX, ALTER TABLE, DROP TABLE, DROP INDEX, TRUNCATE
- CREATE DATABASE, DROP DATABASE

Rules:
{rules}

Current Database: {database}
Database Schema:
{schema}

{request_label} {request}

The examples below use a sample movie-rental database. Adapt their patterns to the schema above and never use example table names that do not exist in it.

Example 1 (aggregation and joins):
Q: "Find each film category and the number of films in it."
SQL:
SELECT c.name AS category_name, COUNT(fc.film_id) AS film_count
FROM category c
JOIN film_category fc ON c.category_id = fc.category_id
GROUP BY c.name
ORDER BY film_count DESC;

Example 2 (window ranking):
Q: "For each store, find the top 3 customers by total spend."
SQL:
WITH customer_spending AS (
    SELECT c.store_id, c.customer_id, c.first_name, c.last_name, SUM(p.amount) AS total_spent
    FROM customer c
    JOIN payment p ON c.customer_id = p.customer_id
    GROUP BY c.store_id, c.customer_id, c.first_name, c.last_name
),
ranked AS (
    SELECT *, DENSE_RANK() OVER (PARTITION BY store_id ORDER BY total_spent DESC) AS ranking
    FROM customer_spending
)
SELECT * FROM ranked WHERE ranking <= 3;

Example 3 (anti-join):
Q: "Find all films that have never been rented."
SQL:
SELECT f.title
FROM film f
LEFT JOIN inventory i ON f.film_id = i.film_id
LEFT JOIN rental r ON i.inventory_id = r.inventory_id
WHERE r.rental_id IS NULL;

Example 4 (deduplicate by rank):
Q: "Remove duplicate actors, keeping the lowest id for each name."
SQL:
DELETE FROM actor
WHERE actor_id IN (
    SELECT actor_id FROM (
        SELECT actor_id,
               ROW_NUMBER() OVER (PARTITION BY first_name, last_name ORDER BY actor_id) AS rn
        FROM actor
    ) ranked
    WHERE rn > 1
);

Example 5 (multi-row insert with derived foreign keys):
Q: "Add the films ACADEMY DINOSAUR and ACE GOLDFINGER to the Action category."
SQL:
INSERT INTO film_category (film_id, category_id)
SELECT f.film_id, c.category_id
FROM film f
JOIN category c ON c.name = 'Action'
WHERE f.title = 'ACADEMY DINOSAUR'
UNION ALL
SELECT f.film_id, c.category_id
FROM film f
JOIN category c ON c.name = 'Action'
WHERE f.title = 'ACE GOLDFINGER';

Generate the statement:"#;

/// Builds the relevance-check prompt.
///
/// `availability` is the data-availability note for insert requests.
pub fn build_validation_prompt(
    request: &str,
    schema: &Schema,
    database: &str,
    availability: Option<&str>,
) -> String {
    let availability = availability
        .map(|note| format!("\nData availability:\n{note}\n"))
        .unwrap_or_default();

    VALIDATION_TEMPLATE
        .replace("{database}", database)
        .replace("{schema}", &schema.format_for_llm())
        .replace("{availability}", &availability)
        .replace("{request}", request)
}

/// Builds the generation prompt.
pub fn build_generation_prompt(
    request: &str,
    schema: &Schema,
    database: Option<&str>,
    rules: Option<&str>,
) -> String {
    let schema_text = if schema.is_empty() {
        "(no tables yet)".to_string()
    } else {
        schema.format_for_llm()
    };

    GENERATION_TEMPLATE
        .replace("{rules}", rules.unwrap_or(DEFAULT_DIALECT_RULES).trim())
        .replace("{database}", database.unwrap_or("default database"))
        .replace("{schema}", &schema_text)
        .replace("{request_label}", REQUEST_LABEL)
        .replace("{request}", request)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schema() -> Schema {
        Schema::from_columns([
            ("players", "player_id", "int"),
            ("players", "name", "varchar"),
            ("matches", "match_type", "varchar"),
        ])
    }

    #[test]
    fn test_validation_prompt_contains_schema_and_request() {
        let prompt =
            build_validation_prompt("show test runs", &sample_schema(), "cricket", None);

        assert!(prompt.contains(GUARD_MARKER));
        assert!(prompt.contains("Database: cricket"));
        assert!(prompt.contains("players: player_id (int), name (varchar)"));
        assert!(prompt.contains("User Request: \"show test runs\""));
        assert!(prompt.contains("Status: [VALID | IRRELEVANT | INVALID_ENTITY]"));
        assert!(!prompt.contains("Data availability"));
    }

    #[test]
    fn test_validation_prompt_includes_availability_note() {
        let prompt = build_validation_prompt(
            "insert a new row into players",
            &sample_schema(),
            "cricket",
            Some("- matches: EMPTY"),
        );

        assert!(prompt.contains("Data availability:\n- matches: EMPTY"));
    }

    #[test]
    fn test_generation_prompt_uses_default_rules() {
        let prompt =
            build_generation_prompt("list players", &sample_schema(), Some("cricket"), None);

        assert!(prompt.contains("Current Database: cricket"));
        assert!(prompt.contains("User Request: list players"));
        assert!(prompt.contains("MySQL 8 syntax"));
        assert!(prompt.contains("DENSE_RANK()"));
        assert!(prompt.contains("UNION ALL"));
    }

    #[test]
    fn test_generation_prompt_custom_rules_and_empty_schema() {
        let prompt = build_generation_prompt(
            "create a table called users",
            &Schema::new(),
            None,
            Some("- Always use InnoDB.\n"),
        );

        assert!(prompt.contains("- Always use InnoDB."));
        assert!(!prompt.contains("MySQL 8 syntax"));
        assert!(prompt.contains("(no tables yet)"));
        assert!(prompt.contains("Current Database: default database"));
    }

    #[test]
    fn test_refine_prompt_mentions_terminology() {
        assert!(REFINE_SYSTEM_PROMPT.contains("terminology"));
        assert!(REFINE_SYSTEM_PROMPT.contains("drop the database"));
    }
}
