use std::collections::HashMap;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;

use crate::conversions::name::{IdentifierKind, conform_name};
use crate::error::{ErrorKind, SinkResult};
use crate::schema::StreamTable;
use crate::types::{Cell, ColumnType, Record, TableRow};
use crate::{bail, sink_error};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M"];

/// Turns a record into a row bound to the columns of `table`.
///
/// Values are bound by column order. Record keys are conformed like property names, absent
/// properties become nulls, and keys without a matching column are ignored. Fails with
/// [`ErrorKind::InvalidData`] when a key column or a required property has no value.
pub fn conform_record(record: &Record, table: &StreamTable) -> SinkResult<TableRow> {
    let mut values: HashMap<String, &Value> = HashMap::with_capacity(record.len());
    for (key, value) in record {
        if let Ok(column) = conform_name(key, IdentifierKind::Column) {
            values.insert(column, value);
        }
    }

    let columns = &table.schema().columns;
    let mut cells = Vec::with_capacity(columns.len());
    for (index, column) in columns.iter().enumerate() {
        let value = values.get(column.name.as_str()).copied();

        if value.is_none() && table.is_required(index) {
            bail!(
                ErrorKind::InvalidData,
                "Record is missing a required property",
                format!(
                    "property `{}` of table `{}`",
                    table.properties()[index],
                    table.name()
                )
            );
        }

        let cell = match value {
            Some(value) => cell_from_json(value, &column.column_type).map_err(|err| {
                sink_error!(
                    err.kind(),
                    "Record value cannot be stored in its column",
                    format!(
                        "column `{}` ({}) of table `{}`: {}",
                        column.name,
                        column.column_type,
                        table.name(),
                        err.detail().unwrap_or(err.description())
                    ),
                    source: err
                )
            })?,
            None => Cell::Null,
        };

        if column.primary_key && cell.is_null() {
            bail!(
                ErrorKind::InvalidData,
                "Record has no value for a key property",
                format!(
                    "key `{}` of table `{}`",
                    table.properties()[index],
                    table.name()
                )
            );
        }

        cells.push(cell);
    }

    Ok(TableRow::new(cells))
}

/// Converts a JSON value into the cell stored in a column of type `column_type`.
pub fn cell_from_json(value: &Value, column_type: &ColumnType) -> SinkResult<Cell> {
    if value.is_null() {
        return Ok(Cell::Null);
    }

    match column_type {
        ColumnType::Varchar(_)
        | ColumnType::NVarchar(_)
        | ColumnType::Text
        | ColumnType::Other(_) => Ok(Cell::String(value_to_text(value))),
        ColumnType::Boolean => parse_bool(value).map(Cell::Bool),
        ColumnType::TinyInt | ColumnType::SmallInt | ColumnType::Int | ColumnType::BigInt => {
            parse_i64(value).map(Cell::I64)
        }
        ColumnType::Numeric { scale, .. } => parse_numeric(value, column_type, *scale),
        ColumnType::Float => parse_f64(value).map(Cell::F64),
        ColumnType::Date => parse_date(expect_str(value, "date")?).map(Cell::Date),
        ColumnType::Time => parse_time(expect_str(value, "time")?).map(Cell::Time),
        ColumnType::DateTime => parse_datetime(expect_str(value, "datetime")?).map(Cell::DateTime),
        ColumnType::Json => Ok(Cell::Json(value.clone())),
    }
}

/// Keeps only the last row of every key tuple, preserving the order of the kept rows.
///
/// `key_indexes` are the positions of the key columns in each row. Key values are compared with
/// [`Cell::key_text`], so text keys differing only in case or trailing spaces collapse.
pub fn dedup_by_key(rows: Vec<TableRow>, key_indexes: &[usize]) -> Vec<TableRow> {
    if key_indexes.is_empty() {
        return rows;
    }

    let mut positions: HashMap<Vec<String>, usize> = HashMap::with_capacity(rows.len());
    let mut kept: Vec<Option<TableRow>> = Vec::with_capacity(rows.len());

    for row in rows {
        let key: Vec<String> = key_indexes
            .iter()
            .map(|&index| row.values()[index].key_text())
            .collect();

        if let Some(previous) = positions.insert(key, kept.len()) {
            kept[previous] = None;
        }
        kept.push(Some(row));
    }

    kept.into_iter().flatten().collect()
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        other => other.to_string(),
    }
}

fn expect_str<'a>(value: &'a Value, expected: &str) -> SinkResult<&'a str> {
    match value {
        Value::String(text) => Ok(text),
        other => bail!(
            ErrorKind::ConversionError,
            "Value is not a string",
            format!("expected a {expected} string, got `{other}`")
        ),
    }
}

fn parse_bool(value: &Value) -> SinkResult<bool> {
    match value {
        Value::Bool(flag) => Ok(*flag),
        Value::Number(number) if number.as_i64() == Some(1) => Ok(true),
        Value::Number(number) if number.as_i64() == Some(0) => Ok(false),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => bail!(
                ErrorKind::ConversionError,
                "Invalid boolean value",
                format!("`{text}` is not a boolean")
            ),
        },
        other => bail!(
            ErrorKind::ConversionError,
            "Invalid boolean value",
            format!("`{other}` is not a boolean")
        ),
    }
}

fn parse_i64(value: &Value) -> SinkResult<i64> {
    let parsed = match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().and_then(integral_f64)),
        Value::String(text) => {
            let text = text.trim();
            text.parse::<i64>()
                .ok()
                .or_else(|| text.parse::<f64>().ok().and_then(integral_f64))
        }
        _ => None,
    };

    match parsed {
        Some(parsed) => Ok(parsed),
        None => bail!(
            ErrorKind::ConversionError,
            "Invalid integer value",
            format!("`{value}` is not an integer within the BIGINT range")
        ),
    }
}

fn integral_f64(value: f64) -> Option<i64> {
    // The bounds are exactly representable; i64::MAX itself is not.
    if value.fract() == 0.0 && (-9_223_372_036_854_775_808.0..9_223_372_036_854_775_808.0).contains(&value) {
        Some(value as i64)
    } else {
        None
    }
}

fn parse_f64(value: &Value) -> SinkResult<f64> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };

    match parsed {
        Some(parsed) if parsed.is_finite() => Ok(parsed),
        _ => bail!(
            ErrorKind::ConversionError,
            "Invalid float value",
            format!("`{value}` is not a finite number")
        ),
    }
}

fn parse_numeric(value: &Value, column_type: &ColumnType, scale: u8) -> SinkResult<Cell> {
    let decimal = match value {
        Value::Number(number) => BigDecimal::from_str(&number.to_string())?,
        Value::String(text) => BigDecimal::from_str(text.trim())?,
        other => bail!(
            ErrorKind::ConversionError,
            "Invalid numeric value",
            format!("`{other}` is not a number")
        ),
    };

    let rounded = decimal.round(i64::from(scale));

    if let ColumnType::Numeric { precision, scale } = column_type {
        let integer_part = rounded.with_scale(0).abs().to_string();
        let integer_digits = integer_part.trim_start_matches('0').len();
        if integer_digits > usize::from(precision.saturating_sub(*scale)) {
            bail!(
                ErrorKind::ConversionError,
                "Numeric value exceeds the column precision",
                format!("`{value}` does not fit in {column_type}")
            );
        }
    }

    Ok(Cell::Numeric(rounded))
}

fn parse_date(text: &str) -> SinkResult<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Ok(date);
    }

    parse_datetime(text).map(|datetime| datetime.date())
}

fn parse_time(text: &str) -> SinkResult<NaiveTime> {
    for format in TIME_FORMATS {
        if let Ok(time) = NaiveTime::parse_from_str(text, format) {
            return Ok(time);
        }
    }

    bail!(
        ErrorKind::ConversionError,
        "Invalid time value",
        format!("`{text}` is not a time")
    );
}

/// Parses timestamps, converting offset-aware ones to UTC.
fn parse_datetime(text: &str) -> SinkResult<NaiveDateTime> {
    let text = text.trim();

    if let Ok(datetime) = DateTime::parse_from_rfc3339(text) {
        return Ok(datetime.naive_utc());
    }

    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(datetime);
        }
    }

    let date = NaiveDate::parse_from_str(text, "%Y-%m-%d")?;
    Ok(date.and_time(NaiveTime::MIN))
}
