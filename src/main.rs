//! Quill - natural-language to SQL for MySQL.

mod cli;
mod output;

use std::io::Write;
use std::sync::Arc;

use cli::{Cli, Command};
use db_quill::config::{Config, ConnectionConfig};
use db_quill::db::{self, Database, MockDatabaseClient, DEMO_DATABASE};
use db_quill::error::{QuillError, Result};
use db_quill::llm::ModelGateway;
use db_quill::logging;
use db_quill::pipeline::Pipeline;
use db_quill::query;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{debug, error, info};

const EXIT_WORDS: [&str; 3] = ["quit", "exit", "q"];

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse_args();

    // Interactive sessions keep the terminal for the prompt.
    match (&cli.log_file, cli.command()) {
        (Some(path), _) => logging::init_file_logging(path),
        (None, Command::Interactive) => logging::init_file_logging(&logging::default_log_path()),
        (None, _) => logging::init_stderr_logging(),
    }

    if let Err(e) = run(cli).await {
        error!("{}: {}", e.category(), e);
        eprintln!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config_path();
    debug!("Loading config from: {}", config_path.display());
    let config = Config::load_from_file(&config_path)?;

    let (database, default_database) = open_database(&cli, &config).await?;
    let result = dispatch(&cli, &config, &database, default_database).await;

    if let Err(e) = database.client.close().await {
        debug!("Error while closing connections: {}", e);
    }
    result
}

async fn dispatch(
    cli: &Cli,
    config: &Config,
    database: &Database,
    default_database: Option<String>,
) -> Result<()> {
    match cli.command() {
        Command::Databases => {
            let mut infos = Vec::new();
            for name in database.schema.list_databases().await {
                infos.push(database.schema.get_database_info(&name).await);
            }
            println!("{}", output::render_databases(&infos, cli.json));
        }
        Command::Schema { database: name } => {
            let name = name.or(default_database).ok_or_else(|| {
                QuillError::config("No database given. Pass one or set -d/--database.")
            })?;
            let schema = database.schema.get_schema(&name).await;
            println!("{}", output::render_schema(&name, &schema, cli.json));
        }
        Command::Execute { sql } => {
            let report =
                query::run_with_advice(database.client.clone(), &sql, default_database.as_deref())
                    .await?;
            println!("{}", output::render_report(&report, cli.json));
        }
        Command::Generate { request, execute } => {
            let pipeline = build_pipeline(cli, config, database, default_database.clone())?;
            let result = pipeline.generate(&request, None).await;
            println!("{}", output::render_synthesis(&result, cli.json));

            if let (true, Some(sql)) = (execute, result.sql()) {
                let report = query::run_with_advice(
                    database.client.clone(),
                    sql,
                    pipeline.default_database(),
                )
                .await?;
                println!("{}", output::render_report(&report, cli.json));
            }
        }
        Command::Interactive => {
            let pipeline = build_pipeline(cli, config, database, default_database)?;
            interactive(&pipeline, database, cli.json).await?;
        }
    }

    Ok(())
}

/// Resolves the final connection configuration from CLI args, config file, and environment.
///
/// Precedence: CLI arguments, then the named connection, then the default
/// connection, then MYSQL_* environment variables.
fn resolve_connection(cli: &Cli, config: &Config) -> Result<ConnectionConfig> {
    let mut connection = match cli.connection_name() {
        Some(name) => config.get_connection(Some(name)).cloned().ok_or_else(|| {
            QuillError::config(format!("Connection '{}' not found in config file", name))
        })?,
        None => config.get_connection(None).cloned().unwrap_or_default(),
    };

    if let Some(overrides) = cli.to_connection_config()? {
        connection.merge(&overrides);
    }

    connection.apply_env_defaults();
    Ok(connection)
}

async fn open_database(cli: &Cli, config: &Config) -> Result<(Database, Option<String>)> {
    if cli.mock_db {
        info!("Using in-memory demo database");
        let default_database = cli
            .database
            .clone()
            .or_else(|| Some(DEMO_DATABASE.to_string()));
        return Ok((Database::new(MockDatabaseClient::demo()), default_database));
    }

    let connection = resolve_connection(cli, config)?;
    info!("Connecting to {}", connection.display_string());
    let database = db::connect(&connection).await?;
    Ok((database, connection.database.clone()))
}

fn build_pipeline(
    cli: &Cli,
    config: &Config,
    database: &Database,
    default_database: Option<String>,
) -> Result<Pipeline> {
    let mut llm_config = config.llm.clone();
    if let Some(provider) = cli.llm {
        llm_config.primary = provider;
    }

    let gateway = ModelGateway::from_config(&llm_config)?;
    info!("LLM backends: {:?}", gateway.providers());

    Ok(
        Pipeline::new(Arc::new(gateway), database.schema.clone(), &config.pipeline)?
            .with_default_database(default_database),
    )
}

async fn read_line(lines: &mut Lines<BufReader<Stdin>>, prompt: &str) -> Result<Option<String>> {
    print!("{prompt}");
    std::io::stdout()
        .flush()
        .map_err(|e| QuillError::internal(format!("Failed to write prompt: {e}")))?;

    lines
        .next_line()
        .await
        .map_err(|e| QuillError::internal(format!("Failed to read input: {e}")))
}

async fn interactive(pipeline: &Pipeline, database: &Database, json: bool) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut current = pipeline.default_database().map(str::to_string);

    println!("Quill - describe what you need, or type 'quit' to leave.");
    println!("Commands: databases, use <database>, quit");

    loop {
        let prompt = format!("{}> ", current.as_deref().unwrap_or("quill"));
        let Some(line) = read_line(&mut lines, &prompt).await? else {
            break;
        };
        let input = line.trim();

        if input.is_empty() {
            continue;
        }
        if EXIT_WORDS.contains(&input.to_lowercase().as_str()) {
            break;
        }
        if input.eq_ignore_ascii_case("databases") {
            let names = database.schema.list_databases().await;
            println!("{}", names.join("\n"));
            continue;
        }
        if let Some(name) = input.strip_prefix("use ") {
            current = Some(name.trim().trim_end_matches(';').to_string());
            continue;
        }

        let result = pipeline.generate(input, current.as_deref()).await;
        println!("{}", output::render_synthesis(&result, json));

        let Some(sql) = result.sql() else {
            continue;
        };
        let answer = read_line(&mut lines, "Execute this statement? [y/N] ").await?;
        if !matches!(answer.as_deref().map(str::trim), Some("y" | "Y" | "yes")) {
            continue;
        }

        match query::run_with_advice(database.client.clone(), sql, current.as_deref()).await {
            Ok(report) => println!("{}", output::render_report(&report, json)),
            Err(e) => println!("{}: {}", e.category(), e),
        }
    }

    Ok(())
}
