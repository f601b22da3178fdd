//! Database schema types for Quill.
//!
//! A schema snapshot is the ordered list of tables of one database, each with
//! its ordered `(name, data_type)` columns.

use serde::{Deserialize, Serialize};

/// Snapshot of the tables of one database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// Tables in first-seen order.
    pub tables: Vec<Table>,
}

impl Schema {
    /// Creates a new empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a schema from `(table, column, data_type)` triples.
    ///
    /// Triples for the same table are grouped under one table, keeping the
    /// order in which tables and columns first appear.
    pub fn from_columns<I, T, C, D>(triples: I) -> Self
    where
        I: IntoIterator<Item = (T, C, D)>,
        T: Into<String>,
        C: Into<String>,
        D: Into<String>,
    {
        let mut schema = Self::new();
        for (table, column, data_type) in triples {
            let table = table.into();
            let column = Column::new(column, data_type);
            match schema.tables.iter_mut().find(|t| t.name == table) {
                Some(existing) => existing.columns.push(column),
                None => schema.tables.push(Table {
                    name: table,
                    columns: vec![column],
                }),
            }
        }
        schema
    }

    /// Returns true if the schema has no tables.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Looks up a table by name, case-insensitively.
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Returns true if a table with this name exists.
    pub fn has_table(&self, name: &str) -> bool {
        self.table(name).is_some()
    }

    /// Returns all table names in order.
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    /// Formats the schema for inclusion in an LLM prompt.
    ///
    /// One line per table: `table: col1 (type), col2 (type)`.
    pub fn format_for_llm(&self) -> String {
        self.tables
            .iter()
            .map(Table::format_for_llm)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A database table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Table name.
    pub name: String,

    /// Columns in ordinal order.
    pub columns: Vec<Column>,
}

impl Table {
    /// Creates a new table with the given name and columns.
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    fn format_for_llm(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|c| format!("{} ({})", c.name, c.data_type))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}: {}", self.name, columns)
    }
}

/// A table column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,

    /// Data type as reported by the database (e.g. `varchar`, `int`).
    pub data_type: String,
}

impl Column {
    /// Creates a new column.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}
