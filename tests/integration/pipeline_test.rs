//! End-to-end pipeline tests with mock collaborators.

use std::sync::Arc;

use db_quill::config::PipelineConfig;
use db_quill::db::MockDatabaseClient;
use db_quill::error::QuillError;
use db_quill::llm::gateway::Backend;
use db_quill::llm::{LlmProvider, MockLlmClient, ModelGateway};
use db_quill::pipeline::{Pipeline, PipelineOutcome, Rejection, SynthesisResult};
use db_quill::sql::OperationType;
use pretty_assertions::assert_eq;
use std::io::Write;

fn cricket_db() -> MockDatabaseClient {
    MockDatabaseClient::new()
        .with_table(
            "cricket",
            "players",
            &[("player_id", "int"), ("name", "varchar"), ("team_id", "int")],
        )
        .with_table("cricket", "teams", &[("team_id", "int"), ("name", "varchar")])
        .with_table(
            "cricket",
            "test_stats",
            &[("player_id", "int"), ("runs", "int")],
        )
        .with_row_count("cricket", "players", 40)
}

fn pipeline_with(mock: MockLlmClient, db: MockDatabaseClient) -> Pipeline {
    Pipeline::new(
        Arc::new(ModelGateway::single(LlmProvider::Mock, Box::new(mock))),
        Arc::new(db),
        &PipelineConfig::default(),
    )
    .unwrap()
}

#[tokio::test]
async fn test_refined_request_drives_generation() {
    let mock = MockLlmClient::new()
        .with_response(
            "get rid of the old players",
            "delete the rows from players whose team_id is null",
        )
        .with_response(
            "user request: delete the rows from players",
            "```sql\nDELETE FROM players WHERE team_id IS NULL;\n```",
        );
    let observer = mock.clone();

    let outcome = pipeline_with(mock, cricket_db())
        .run("get rid of the old players", Some("cricket"))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        PipelineOutcome::Generated {
            sql: "DELETE FROM players WHERE team_id IS NULL;".to_string(),
            operation_type: OperationType::Delete,
        }
    );
    // Refine, relevance check, generation.
    assert_eq!(observer.call_count(), 3);
    assert_eq!(observer.call_count_matching("strict database guard"), 1);
}

#[tokio::test]
async fn test_invalid_entity_reason_is_propagated() {
    let mock = MockLlmClient::new().with_response(
        "strict database guard",
        "Reasoning: The schema has test statistics only.\n\
         Status: INVALID_ENTITY\n\
         Error: There is no ODI statistics table.",
    );
    let observer = mock.clone();

    let result = pipeline_with(mock, cricket_db())
        .generate("show ODI runs for every player", Some("cricket"))
        .await;

    assert_eq!(
        result,
        SynthesisResult::Error {
            error: "ERROR: I cannot generate SQL. There is no ODI statistics table.".to_string()
        }
    );
    assert_eq!(observer.call_count_matching("expert MySQL"), 0);
}

#[tokio::test]
async fn test_insert_request_sees_empty_tables() {
    let mock = MockLlmClient::new().with_response(
        "- teams: empty",
        "Reasoning: Every player needs a team but teams is empty.\n\
         Status: INVALID_ENTITY\n\
         Error: The teams table has no rows to reference.",
    );

    let outcome = pipeline_with(mock, cricket_db())
        .run("add a player named Rahul to players", Some("cricket"))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        PipelineOutcome::Rejected(Rejection::InvalidEntity(
            "I cannot generate SQL. The teams table has no rows to reference.".to_string()
        ))
    );
}

#[tokio::test]
async fn test_validator_outage_fails_open() {
    let mock = MockLlmClient::new().with_failure("strict database guard");

    let outcome = pipeline_with(mock, cricket_db())
        .run("count users", Some("cricket"))
        .await
        .unwrap();

    assert!(matches!(outcome, PipelineOutcome::Generated { .. }));
}

#[tokio::test]
async fn test_generation_outage_is_a_rejection() {
    let mock = MockLlmClient::new().with_failure("expert mysql");

    let outcome = pipeline_with(mock, cricket_db())
        .run("show all players", Some("cricket"))
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        PipelineOutcome::Rejected(Rejection::SynthesisFailed(_))
    ));
}

#[tokio::test]
async fn test_schema_gate_makes_no_model_call() {
    let mock = MockLlmClient::new();
    let observer = mock.clone();

    let err = pipeline_with(mock, MockDatabaseClient::new().with_database("blank"))
        .run("show all users", Some("blank"))
        .await
        .unwrap_err();

    assert!(matches!(err, QuillError::SchemaUnavailable(_)));
    assert_eq!(observer.call_count(), 0);
}

#[tokio::test]
async fn test_gateway_fallback_inside_pipeline() {
    let broken = MockLlmClient::failing();
    let healthy = MockLlmClient::new();
    let broken_log = broken.clone();
    let gateway = ModelGateway::new(vec![
        Backend::new(LlmProvider::Groq, Box::new(broken)),
        Backend::new(LlmProvider::Mock, Box::new(healthy)),
    ]);

    let pipeline = Pipeline::new(
        Arc::new(gateway),
        Arc::new(cricket_db()),
        &PipelineConfig::default(),
    )
    .unwrap();

    let result = pipeline.generate("count users", Some("cricket")).await;

    assert_eq!(result.sql(), Some("SELECT COUNT(*) FROM users;"));
    // The broken backend is tried once per model call.
    assert_eq!(broken_log.call_count(), 3);
}

#[tokio::test]
async fn test_rules_file_replaces_default_rules() {
    let mut rules = tempfile::NamedTempFile::new().unwrap();
    writeln!(rules, "- Always qualify columns with their table alias.").unwrap();

    let mock = MockLlmClient::new();
    let observer = mock.clone();
    let config = PipelineConfig {
        rules_file: Some(rules.path().to_path_buf()),
        ..Default::default()
    };
    let pipeline = Pipeline::new(
        Arc::new(ModelGateway::single(LlmProvider::Mock, Box::new(mock))),
        Arc::new(cricket_db()),
        &config,
    )
    .unwrap();

    pipeline.generate("show all players", Some("cricket")).await;

    let generation = observer
        .calls()
        .into_iter()
        .find(|call| call.contains("expert MySQL"))
        .unwrap();
    assert!(generation.contains("Always qualify columns"));
    assert!(!generation.contains("MySQL 8 syntax"));
}

#[test]
fn test_missing_rules_file_is_a_config_error() {
    let config = PipelineConfig {
        rules_file: Some("/definitely/not/here/rules.txt".into()),
        ..Default::default()
    };

    let result = Pipeline::new(
        Arc::new(ModelGateway::single(
            LlmProvider::Mock,
            Box::new(MockLlmClient::new()),
        )),
        Arc::new(cricket_db()),
        &config,
    );

    assert!(matches!(result, Err(QuillError::Config(_))));
}
