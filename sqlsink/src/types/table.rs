use std::fmt;

use crate::types::ColumnSchema;

/// Fully qualified name of a destination table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableName {
    /// Schema the table lives in, or `None` to use the connection default.
    pub schema: Option<String>,
    pub name: String,
}

impl TableName {
    pub fn new(schema: Option<String>, name: impl Into<String>) -> Self {
        Self {
            schema,
            name: name.into(),
        }
    }

    /// Returns the session-scoped staging table used to load this table.
    pub fn staging_table(&self) -> TableName {
        TableName::new(None, format!("#{}", self.name))
    }

    /// Returns whether this is a session-scoped staging table.
    pub fn is_staging(&self) -> bool {
        self.name.starts_with('#')
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{schema}.{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Desired shape of a destination table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: TableName,
    /// Columns in stream property order.
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    pub fn new(name: TableName, columns: Vec<ColumnSchema>) -> Self {
        Self { name, columns }
    }

    /// Returns the primary key columns in declaration order.
    pub fn key_columns(&self) -> impl Iterator<Item = &ColumnSchema> {
        self.columns.iter().filter(|column| column.primary_key)
    }

    pub fn has_primary_key(&self) -> bool {
        self.columns.iter().any(|column| column.primary_key)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }
}
