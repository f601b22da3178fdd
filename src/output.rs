//! Plain-text and JSON rendering of command results.

use db_quill::db::{DatabaseInfo, QueryResult, Schema};
use db_quill::pipeline::SynthesisResult;
use db_quill::query::{ExecutionOutcome, ExecutionReport};
use serde_json::json;

/// Longest cell rendered before truncation.
const MAX_CELL_WIDTH: usize = 40;

fn clip(cell: String) -> String {
    if cell.chars().count() <= MAX_CELL_WIDTH {
        return cell;
    }
    let mut clipped: String = cell.chars().take(MAX_CELL_WIDTH - 3).collect();
    clipped.push_str("...");
    clipped
}

/// Renders rows as an aligned text table.
pub fn render_table(result: &QueryResult) -> String {
    if result.columns.is_empty() {
        return "(no columns)".to_string();
    }

    let headers: Vec<String> = result.columns.iter().map(|c| c.name.clone()).collect();
    let cells: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| row.iter().map(|v| clip(v.to_string())).collect())
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let line = |values: &[String]| {
        values
            .iter()
            .zip(&widths)
            .map(|(value, &width)| format!("{value:<width$}"))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };
    let separator = widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>()
        .join("-+-");

    let mut out = vec![line(headers.as_slice()), separator];
    out.extend(cells.iter().map(|row| line(row.as_slice())));

    let noun = if result.row_count == 1 { "row" } else { "rows" };
    out.push(format!(
        "({} {noun}, {} ms)",
        result.row_count,
        result.execution_time.as_millis()
    ));
    if let Some(warning) = result.truncation_warning() {
        out.push(warning);
    }
    out.join("\n")
}

/// Renders a generation result.
pub fn render_synthesis(result: &SynthesisResult, json: bool) -> String {
    if json {
        return serde_json::to_string_pretty(result).unwrap_or_default();
    }
    match result {
        SynthesisResult::Sql {
            sql,
            operation_type,
        } => format!("-- {operation_type}\n{sql}"),
        SynthesisResult::Error { error } => error.clone(),
    }
}

/// Renders an execution report with its tips.
pub fn render_report(report: &ExecutionReport, json: bool) -> String {
    if json {
        let results = match &report.outcome {
            ExecutionOutcome::Rows(rows) => json!(rows.to_json_rows()),
            summary @ ExecutionOutcome::Summary { .. } => match serde_json::to_value(summary) {
                Ok(value) => json!([value["summary"].clone()]),
                Err(_) => json!([]),
            },
        };
        let value = json!({
            "results": results,
            "operation_type": report.operation_type,
            "optimization_tips": report.optimization_tips,
        });
        return serde_json::to_string_pretty(&value).unwrap_or_default();
    }

    let body = match &report.outcome {
        ExecutionOutcome::Rows(rows) => render_table(rows),
        ExecutionOutcome::Summary {
            operation,
            rows_affected,
            status,
            message,
        } => {
            let mut parts = vec![format!("{operation}: {status}")];
            if let Some(rows) = rows_affected {
                parts.push(format!("{rows} row(s) affected"));
            }
            if let Some(message) = message {
                parts.push(message.clone());
            }
            parts.join(" - ")
        }
    };
    format!("{body}\n\nOptimization tips: {}", report.optimization_tips)
}

/// Renders a schema, one table per line.
pub fn render_schema(database: &str, schema: &Schema, json: bool) -> String {
    if json {
        let value = json!({
            "database": database,
            "schema": schema,
            "table_names": schema.table_names(),
        });
        return serde_json::to_string_pretty(&value).unwrap_or_default();
    }
    if schema.is_empty() {
        return format!("{database}: no tables");
    }
    format!("{database}\n{}", schema.format_for_llm())
}

/// Renders the database list.
pub fn render_databases(databases: &[DatabaseInfo], json: bool) -> String {
    if json {
        return serde_json::to_string_pretty(databases).unwrap_or_default();
    }
    if databases.is_empty() {
        return "No user databases found.".to_string();
    }
    databases
        .iter()
        .map(|db| format!("{:<30} {:>5} tables {:>10.2} MB", db.name, db.table_count, db.size_mb))
        .collect::<Vec<_>>()
        .join("\n")
}
