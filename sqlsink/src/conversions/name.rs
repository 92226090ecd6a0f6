use sqlsink_config::shared::SinkConfig;

use crate::bail;
use crate::error::{ErrorKind, SinkResult};
use crate::types::TableName;

/// Longest table name whose `#`-prefixed staging name still fits SQL Server's temp table limit.
pub const MAX_TABLE_NAME_LENGTH: usize = 115;

/// Longest identifier accepted by SQL Server.
pub const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Schema that replaces the `public` schema segment of stream names.
pub const DEFAULT_SCHEMA: &str = "dbo";

/// Kind of identifier being conformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    Database,
    Schema,
    Table,
    Column,
}

impl IdentifierKind {
    pub fn max_length(self) -> usize {
        match self {
            IdentifierKind::Table => MAX_TABLE_NAME_LENGTH,
            IdentifierKind::Database | IdentifierKind::Schema | IdentifierKind::Column => {
                MAX_IDENTIFIER_LENGTH
            }
        }
    }
}

/// Normalizes an external identifier into a lowercase snake_case SQL identifier.
///
/// Separators (`-`, `.`, whitespace) become underscores and other special characters are
/// dropped. A leading digit is prefixed with an underscore. Fails with
/// [`ErrorKind::InvalidSchema`] when nothing usable is left.
pub fn conform_name(name: &str, kind: IdentifierKind) -> SinkResult<String> {
    let chars: Vec<char> = name
        .trim()
        .chars()
        .filter_map(|c| match c {
            '-' | '.' => Some('_'),
            c if c.is_whitespace() => Some('_'),
            c if c.is_alphanumeric() || c == '_' => Some(c),
            _ => None,
        })
        .collect();

    let mut conformed = String::with_capacity(chars.len() + 4);
    for (index, &c) in chars.iter().enumerate() {
        if c.is_uppercase() && index > 0 {
            let previous = chars[index - 1];
            let ends_acronym = previous.is_uppercase()
                && chars
                    .get(index + 1)
                    .is_some_and(|next| next.is_lowercase());

            if previous.is_lowercase() || previous.is_numeric() || ends_acronym {
                conformed.push('_');
            }
        }

        conformed.extend(c.to_lowercase());
    }

    if conformed.starts_with(|c: char| c.is_numeric()) {
        conformed.insert(0, '_');
    }

    if conformed.is_empty() {
        bail!(
            ErrorKind::InvalidSchema,
            "Identifier is empty once conformed",
            format!("{kind:?} name `{name}`")
        );
    }

    Ok(conformed.chars().take(kind.max_length()).collect())
}

/// Returns the schema a stream is written to.
///
/// A configured default schema always wins. Otherwise streams named `<schema>-<table>` or
/// `<db>-<schema>-<table>` use their schema segment, with `public` mapped to `dbo`. Stream names
/// with any other number of segments have no schema part.
pub fn schema_name_for_stream(
    stream: &str,
    default_target_schema: Option<&str>,
) -> SinkResult<Option<String>> {
    if let Some(schema) = default_target_schema {
        return Ok(Some(schema.trim().to_string()));
    }

    let segments: Vec<&str> = stream.split('-').collect();
    if !matches!(segments.len(), 2 | 3) {
        return Ok(None);
    }

    let schema = conform_name(segments[segments.len() - 2], IdentifierKind::Schema)?;
    if schema == "public" {
        return Ok(Some(DEFAULT_SCHEMA.to_string()));
    }

    Ok(Some(schema))
}

/// Returns the destination table of a stream.
///
/// The table name is the last hyphen-separated segment of the stream name, conformed and
/// prefixed with the configured table prefix.
pub fn table_name_for_stream(stream: &str, config: &SinkConfig) -> SinkResult<TableName> {
    let last_segment = stream.rsplit('-').next().unwrap_or(stream);
    let name = conform_name(last_segment, IdentifierKind::Table)?;
    let name = match config.table_prefix.as_deref() {
        Some(prefix) => format!("{prefix}{name}")
            .chars()
            .take(MAX_TABLE_NAME_LENGTH)
            .collect(),
        None => name,
    };

    let schema = schema_name_for_stream(stream, config.default_target_schema.as_deref())?;

    Ok(TableName::new(schema, name))
}
