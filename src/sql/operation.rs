//! Statement classification by leading keywords.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kind of statement a candidate SQL string performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationType {
    Select,
    Insert,
    Update,
    Delete,
    CreateTable,
    CreateIndex,
    CreateDatabase,
    AlterTable,
    DropTable,
    DropIndex,
    DropDatabase,
    Truncate,
    Unknown,
}

/// Keyword sequences, matched case-insensitively; the longest match wins.
const KEYWORD_TABLE: &[(&[&str], OperationType)] = &[
    (&["SELECT"], OperationType::Select),
    (&["WITH"], OperationType::Select),
    (&["INSERT"], OperationType::Insert),
    (&["UPDATE"], OperationType::Update),
    (&["DELETE"], OperationType::Delete),
    (&["CREATE", "TABLE"], OperationType::CreateTable),
    (&["CREATE", "TEMPORARY", "TABLE"], OperationType::CreateTable),
    (&["CREATE", "INDEX"], OperationType::CreateIndex),
    (&["CREATE", "UNIQUE", "INDEX"], OperationType::CreateIndex),
    (&["CREATE", "FULLTEXT", "INDEX"], OperationType::CreateIndex),
    (&["CREATE", "SPATIAL", "INDEX"], OperationType::CreateIndex),
    (&["CREATE", "DATABASE"], OperationType::CreateDatabase),
    (&["CREATE", "SCHEMA"], OperationType::CreateDatabase),
    (&["ALTER", "TABLE"], OperationType::AlterTable),
    (&["DROP", "TABLE"], OperationType::DropTable),
    (&["DROP", "TEMPORARY", "TABLE"], OperationType::DropTable),
    (&["DROP", "INDEX"], OperationType::DropIndex),
    (&["DROP", "DATABASE"], OperationType::DropDatabase),
    (&["DROP", "SCHEMA"], OperationType::DropDatabase),
    (&["TRUNCATE"], OperationType::Truncate),
];

const MAX_SEQUENCE_LEN: usize = 3;

impl OperationType {
    /// Returns the SCREAMING_SNAKE_CASE name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::CreateTable => "CREATE_TABLE",
            Self::CreateIndex => "CREATE_INDEX",
            Self::CreateDatabase => "CREATE_DATABASE",
            Self::AlterTable => "ALTER_TABLE",
            Self::DropTable => "DROP_TABLE",
            Self::DropIndex => "DROP_INDEX",
            Self::DropDatabase => "DROP_DATABASE",
            Self::Truncate => "TRUNCATE",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Returns true for statements that return rows.
    pub fn is_read(&self) -> bool {
        matches!(self, Self::Select)
    }

    /// Returns true for statements that remove data or objects.
    pub fn is_destructive(&self) -> bool {
        matches!(
            self,
            Self::Delete | Self::DropTable | Self::DropIndex | Self::DropDatabase | Self::Truncate
        )
    }

    /// Returns true when the driver's affected-row count is meaningful.
    pub fn reports_rows_affected(&self) -> bool {
        matches!(
            self,
            Self::Insert | Self::Update | Self::Delete | Self::Truncate
        )
    }

    /// Returns true for statements that must run outside any database.
    pub fn is_server_level(&self) -> bool {
        matches!(self, Self::CreateDatabase | Self::DropDatabase)
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OperationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase().replace(' ', "_");
        [
            Self::Select,
            Self::Insert,
            Self::Update,
            Self::Delete,
            Self::CreateTable,
            Self::CreateIndex,
            Self::CreateDatabase,
            Self::AlterTable,
            Self::DropTable,
            Self::DropIndex,
            Self::DropDatabase,
            Self::Truncate,
            Self::Unknown,
        ]
        .into_iter()
        .find(|op| op.as_str() == normalized)
        .ok_or_else(|| format!("Unknown operation type: {}", s))
    }
}

/// Skips whitespace and `--`, `#` and `/* */` comments at the start.
pub(crate) fn strip_leading_comments(sql: &str) -> &str {
    let mut rest = sql.trim_start();
    loop {
        if rest.starts_with("--") || rest.starts_with('#') {
            rest = match rest.find('\n') {
                Some(end) => rest[end + 1..].trim_start(),
                None => "",
            };
        } else if let Some(body) = rest.strip_prefix("/*") {
            rest = match body.find("*/") {
                Some(end) => body[end + 2..].trim_start(),
                None => "",
            };
        } else {
            return rest;
        }
    }
}

/// Maps a statement to its operation type.
pub fn classify(sql: &str) -> OperationType {
    let words: Vec<String> = strip_leading_comments(sql)
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|word| !word.is_empty())
        .take(MAX_SEQUENCE_LEN)
        .map(str::to_uppercase)
        .collect();

    KEYWORD_TABLE
        .iter()
        .filter(|(sequence, _)| {
            sequence.len() <= words.len()
                && sequence.iter().zip(&words).all(|(kw, word)| *kw == word)
        })
        .max_by_key(|(sequence, _)| sequence.len())
        .map(|(_, op)| *op)
        .unwrap_or(OperationType::Unknown)
}
