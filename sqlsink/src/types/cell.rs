use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// A typed value bound to a single column of a destination row.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    String(String),
    I64(i64),
    F64(f64),
    Numeric(BigDecimal),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Json(serde_json::Value),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Returns the number of characters this value occupies once stored as text.
    ///
    /// Used to enforce bounded character columns.
    pub fn text_len(&self) -> Option<usize> {
        match self {
            Cell::Bool(_) => Some(1),
            Cell::String(value) => Some(value.chars().count()),
            _ => None,
        }
    }

    /// Returns the text two key values are compared by.
    ///
    /// Keys match the way SQL Server's default collation compares them: text ignores case and
    /// trailing spaces, so `"A"`, `"a"` and `"a "` are the same key.
    pub fn key_text(&self) -> String {
        match self {
            Cell::Null => String::new(),
            Cell::Bool(value) => value.to_string(),
            Cell::String(value) => value.trim_end_matches(' ').to_lowercase(),
            Cell::I64(value) => value.to_string(),
            Cell::F64(value) => value.to_string(),
            Cell::Numeric(value) => value.normalized().to_string(),
            Cell::Date(value) => value.to_string(),
            Cell::Time(value) => value.to_string(),
            Cell::DateTime(value) => value.to_string(),
            Cell::Json(value) => value.to_string(),
        }
    }
}

/// A complete row of cells ordered like the destination table columns.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    values: Vec<Cell>,
}

impl TableRow {
    pub fn new(values: Vec<Cell>) -> Self {
        Self { values }
    }

    /// Returns the row values in column order.
    pub fn values(&self) -> &[Cell] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Cell> {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_text_ignores_case_and_trailing_spaces() {
        let keys: Vec<String> = ["A", "a", "a ", "a   "]
            .into_iter()
            .map(|value| Cell::String(value.to_string()).key_text())
            .collect();

        assert!(keys.iter().all(|key| key == "a"));
        assert_ne!(
            Cell::String(" a".to_string()).key_text(),
            Cell::String("a".to_string()).key_text()
        );
        assert_eq!(Cell::I64(7).key_text(), "7");
    }
}
