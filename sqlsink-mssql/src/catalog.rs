//! Maps SQL Server catalog types back to column types.

use sqlsink::types::ColumnType;

/// `sys.columns.max_length` of `(max)` columns.
const MAX_LENGTH_UNBOUNDED: i16 = -1;

/// Parses a `sys.types` name and its `sys.columns` size attributes into a [`ColumnType`].
///
/// `max_length` is in bytes, so lengths of the national character types are halved. National
/// and narrow integer types keep their own variants so widening never converts a Unicode column
/// to a code-page one or skips an integer that is too small. Types this crate never creates come
/// back as [`ColumnType::Other`].
pub fn parse_column_type(type_name: &str, max_length: i16, precision: u8, scale: u8) -> ColumnType {
    let type_name = type_name.to_ascii_lowercase();

    match type_name.as_str() {
        "varchar" | "char" => match max_length {
            MAX_LENGTH_UNBOUNDED => ColumnType::Varchar(None),
            length => ColumnType::Varchar(Some(length.max(0) as u32)),
        },
        "nvarchar" | "nchar" => match max_length {
            MAX_LENGTH_UNBOUNDED => ColumnType::NVarchar(None),
            length => ColumnType::NVarchar(Some((length.max(0) / 2) as u32)),
        },
        "text" | "ntext" => ColumnType::Text,
        "tinyint" => ColumnType::TinyInt,
        "smallint" => ColumnType::SmallInt,
        "int" => ColumnType::Int,
        "bigint" => ColumnType::BigInt,
        "decimal" | "numeric" => ColumnType::Numeric { precision, scale },
        "float" | "real" => ColumnType::Float,
        "date" => ColumnType::Date,
        "time" => ColumnType::Time,
        "datetime" | "datetime2" | "smalldatetime" => ColumnType::DateTime,
        _ => ColumnType::Other(type_name),
    }
}
