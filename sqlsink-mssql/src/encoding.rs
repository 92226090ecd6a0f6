//! Encodes cells into request parameters.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlsink::bail;
use sqlsink::error::{ErrorKind, SinkResult};
use sqlsink::types::Cell;
use tiberius::Query;

/// A value bound to a request parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Null,
    Text(String),
    BigInt(i64),
    Float(f64),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
}

/// Converts a cell into the parameter it is bound as.
///
/// Booleans are stored as `'1'`/`'0'`. Numerics are sent as plain decimal text, which SQL
/// Server converts exactly, and JSON as compact text.
pub fn encode_cell(cell: &Cell) -> SinkResult<SqlParam> {
    let param = match cell {
        Cell::Null => SqlParam::Null,
        Cell::Bool(value) => SqlParam::Text(if *value { "1" } else { "0" }.to_string()),
        Cell::String(value) => SqlParam::Text(value.clone()),
        Cell::I64(value) => SqlParam::BigInt(*value),
        Cell::F64(value) => {
            if !value.is_finite() {
                bail!(
                    ErrorKind::ConversionError,
                    "Non-finite floats cannot be stored",
                    value.to_string()
                );
            }
            SqlParam::Float(*value)
        }
        Cell::Numeric(value) => SqlParam::Text(value.to_plain_string()),
        Cell::Date(value) => SqlParam::Date(*value),
        Cell::Time(value) => SqlParam::Time(*value),
        Cell::DateTime(value) => SqlParam::DateTime(*value),
        Cell::Json(value) => SqlParam::Text(value.to_string()),
    };

    Ok(param)
}

/// Binds `param` as the next parameter of `query`.
pub fn bind_param(query: &mut Query<'_>, param: SqlParam) {
    match param {
        SqlParam::Null => query.bind(Option::<String>::None),
        SqlParam::Text(value) => query.bind(value),
        SqlParam::BigInt(value) => query.bind(value),
        SqlParam::Float(value) => query.bind(value),
        SqlParam::Date(value) => query.bind(value),
        SqlParam::Time(value) => query.bind(value),
        SqlParam::DateTime(value) => query.bind(value),
    }
}
