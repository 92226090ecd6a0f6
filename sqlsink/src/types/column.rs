use std::fmt;

/// Precision of the widest exact numeric type.
pub const MAX_NUMERIC_PRECISION: u8 = 38;

/// Longest bounded `NVARCHAR`, in characters.
pub const MAX_NVARCHAR_LENGTH: u32 = 4000;

/// Concrete SQL column type.
///
/// The [`fmt::Display`] implementation renders the SQL Server spelling of each type, which is
/// also the form compared when deciding whether two types are identical.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// Bounded (`Some(n)`) or unconstrained (`None`) character data.
    Varchar(Option<u32>),
    /// Bounded (`Some(n)`) or unconstrained (`None`) Unicode character data.
    ///
    /// Only found in live tables. Merging it with other textual types keeps it Unicode.
    NVarchar(Option<u32>),
    Text,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Numeric { precision: u8, scale: u8 },
    Float,
    Date,
    Time,
    DateTime,
    Json,
    /// Boolean stored as a single `'1'`/`'0'` character.
    Boolean,
    /// Type found in a live table that has no counterpart in this vocabulary.
    Other(String),
}

/// Groups of column types that can be merged with each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Textual,
    Integer,
    ExactNumeric,
    Float,
    Date,
    Time,
    DateTime,
    Json,
    Opaque,
}

impl ColumnType {
    /// Default type of JSON `number` properties.
    pub const DEFAULT_NUMERIC: ColumnType = ColumnType::Numeric {
        precision: MAX_NUMERIC_PRECISION,
        scale: 16,
    };

    pub fn category(&self) -> TypeCategory {
        match self {
            ColumnType::Varchar(_)
            | ColumnType::NVarchar(_)
            | ColumnType::Text
            | ColumnType::Boolean => TypeCategory::Textual,
            ColumnType::TinyInt | ColumnType::SmallInt | ColumnType::Int | ColumnType::BigInt => {
                TypeCategory::Integer
            }
            ColumnType::Numeric { .. } => TypeCategory::ExactNumeric,
            ColumnType::Float => TypeCategory::Float,
            ColumnType::Date => TypeCategory::Date,
            ColumnType::Time => TypeCategory::Time,
            ColumnType::DateTime => TypeCategory::DateTime,
            ColumnType::Json => TypeCategory::Json,
            ColumnType::Other(_) => TypeCategory::Opaque,
        }
    }

    /// Returns the capacity rank of a textual type, or `None` for other categories.
    ///
    /// Bounded types rank by length in characters, the unconstrained ones rank above every
    /// bounded one, and `TEXT` ranks above everything.
    pub fn textual_rank(&self) -> Option<u64> {
        match self {
            ColumnType::Boolean => Some(1),
            ColumnType::Varchar(Some(length)) | ColumnType::NVarchar(Some(length)) => {
                Some(u64::from(*length))
            }
            ColumnType::Varchar(None) | ColumnType::NVarchar(None) => Some(u64::MAX - 1),
            ColumnType::Text => Some(u64::MAX),
            _ => None,
        }
    }

    /// Returns the storage width in bytes of an integer type, or `None` for other categories.
    pub fn integer_width(&self) -> Option<u8> {
        match self {
            ColumnType::TinyInt => Some(1),
            ColumnType::SmallInt => Some(2),
            ColumnType::Int => Some(4),
            ColumnType::BigInt => Some(8),
            _ => None,
        }
    }

    /// Whether values of this type are stored as Unicode text.
    pub fn is_national(&self) -> bool {
        matches!(self, ColumnType::NVarchar(_))
    }

    /// Returns the rendered SQL form of this type.
    pub fn sql(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Varchar(Some(length)) => write!(f, "VARCHAR({length})"),
            ColumnType::Varchar(None) => f.write_str("VARCHAR(MAX)"),
            ColumnType::NVarchar(Some(length)) => write!(f, "NVARCHAR({length})"),
            ColumnType::NVarchar(None) => f.write_str("NVARCHAR(MAX)"),
            ColumnType::Text => f.write_str("TEXT"),
            ColumnType::TinyInt => f.write_str("TINYINT"),
            ColumnType::SmallInt => f.write_str("SMALLINT"),
            ColumnType::Int => f.write_str("INT"),
            ColumnType::BigInt => f.write_str("BIGINT"),
            ColumnType::Numeric { precision, scale } => write!(f, "NUMERIC({precision},{scale})"),
            ColumnType::Float => f.write_str("FLOAT"),
            ColumnType::Date => f.write_str("DATE"),
            ColumnType::Time => f.write_str("TIME"),
            ColumnType::DateTime => f.write_str("DATETIME"),
            ColumnType::Json => f.write_str("NVARCHAR(MAX)"),
            ColumnType::Boolean => f.write_str("VARCHAR(1)"),
            ColumnType::Other(name) => f.write_str(name),
        }
    }
}

/// A column of a destination table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    pub name: String,
    pub column_type: ColumnType,
    /// Whether the column is part of the primary key.
    pub primary_key: bool,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, column_type: ColumnType, primary_key: bool) -> Self {
        Self {
            name: name.into(),
            column_type,
            primary_key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rendering() {
        let rendered: Vec<String> = [
            ColumnType::Varchar(Some(50)),
            ColumnType::Varchar(None),
            ColumnType::NVarchar(Some(100)),
            ColumnType::NVarchar(None),
            ColumnType::Text,
            ColumnType::TinyInt,
            ColumnType::SmallInt,
            ColumnType::Int,
            ColumnType::BigInt,
            ColumnType::DEFAULT_NUMERIC,
            ColumnType::Float,
            ColumnType::Date,
            ColumnType::Time,
            ColumnType::DateTime,
            ColumnType::Json,
            ColumnType::Boolean,
            ColumnType::Other("uniqueidentifier".to_string()),
        ]
        .iter()
        .map(ColumnType::sql)
        .collect();

        insta::assert_debug_snapshot!(rendered, @r#"
        [
            "VARCHAR(50)",
            "VARCHAR(MAX)",
            "NVARCHAR(100)",
            "NVARCHAR(MAX)",
            "TEXT",
            "TINYINT",
            "SMALLINT",
            "INT",
            "BIGINT",
            "NUMERIC(38,16)",
            "FLOAT",
            "DATE",
            "TIME",
            "DATETIME",
            "NVARCHAR(MAX)",
            "VARCHAR(1)",
            "uniqueidentifier",
        ]
        "#);
    }

    #[test]
    fn test_boolean_renders_like_single_char_varchar() {
        assert_eq!(ColumnType::Boolean.sql(), ColumnType::Varchar(Some(1)).sql());
        assert_eq!(ColumnType::Boolean.category(), TypeCategory::Textual);
    }

    #[test]
    fn test_textual_rank_order() {
        let ranks: Vec<_> = [
            ColumnType::Boolean,
            ColumnType::Varchar(Some(255)),
            ColumnType::Varchar(None),
            ColumnType::Text,
        ]
        .iter()
        .map(|ty| ty.textual_rank().unwrap())
        .collect();

        assert!(ranks.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(ColumnType::BigInt.textual_rank(), None);
    }
}
