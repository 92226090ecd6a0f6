use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Options controlling how streams are mapped onto destination tables.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SinkConfig {
    /// Maps JSON `number` properties to `FLOAT` instead of `NUMERIC(38,16)`.
    #[serde(default)]
    pub prefer_float_over_numeric: bool,
    /// Schema every table is written to, overriding the schema derived from the stream name.
    #[serde(default)]
    pub default_target_schema: Option<String>,
    /// Literal prefix prepended to every table name.
    #[serde(default)]
    pub table_prefix: Option<String>,
    /// Whether missing columns may be added to existing tables.
    #[serde(default = "default_true")]
    pub allow_column_add: bool,
    /// Whether existing columns may be altered to a wider type.
    #[serde(default = "default_true")]
    pub allow_column_alter: bool,
}

impl SinkConfig {
    /// Validates sink options.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(schema) = &self.default_target_schema
            && schema.trim().is_empty()
        {
            return Err(ValidationError::InvalidFieldValue {
                field: "sink.default_target_schema".to_string(),
                constraint: "must not be empty when set".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            prefer_float_over_numeric: false,
            default_target_schema: None,
            table_prefix: None,
            allow_column_add: true,
            allow_column_alter: true,
        }
    }
}

const fn default_true() -> bool {
    true
}
