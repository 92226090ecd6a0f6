use sqlsink_config::shared::SinkConfig;

use crate::types::{ColumnType, JsonType, PropertySchema};

/// Longest `maxLength` still stored in a bounded `VARCHAR`.
pub const MAX_BOUNDED_VARCHAR_LENGTH: u64 = 8000;

/// Length of character key columns, small enough for an index key.
pub const KEY_VARCHAR_LENGTH: u32 = 255;

/// Maps property descriptors to concrete column types.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeMapper {
    prefer_float_over_numeric: bool,
}

impl TypeMapper {
    pub fn new(prefer_float_over_numeric: bool) -> Self {
        Self {
            prefer_float_over_numeric,
        }
    }

    pub fn from_config(config: &SinkConfig) -> Self {
        Self::new(config.prefer_float_over_numeric)
    }

    /// Returns the column type of a property.
    ///
    /// Kinds are tried in a fixed priority order so union descriptors resolve deterministically,
    /// and anything unrecognized falls back to an unconstrained `VARCHAR`.
    pub fn map_type(&self, descriptor: &PropertySchema) -> ColumnType {
        if let Some(string) = descriptor.variant(JsonType::String) {
            return map_string(string);
        }
        if descriptor.declares(JsonType::Integer) {
            return ColumnType::BigInt;
        }
        if descriptor.declares(JsonType::Number) {
            return if self.prefer_float_over_numeric {
                ColumnType::Float
            } else {
                ColumnType::DEFAULT_NUMERIC
            };
        }
        if descriptor.declares(JsonType::Boolean) {
            return ColumnType::Boolean;
        }
        if descriptor.declares(JsonType::Object) {
            return ColumnType::Varchar(None);
        }
        if descriptor.declares(JsonType::Array) {
            return ColumnType::Json;
        }

        ColumnType::Varchar(None)
    }

    /// Returns the column type of a property, applying the key override to key columns.
    ///
    /// Character key columns are always `VARCHAR(255)`.
    pub fn map_column(&self, descriptor: &PropertySchema, is_key: bool) -> ColumnType {
        match self.map_type(descriptor) {
            ColumnType::Varchar(_) if is_key => ColumnType::Varchar(Some(KEY_VARCHAR_LENGTH)),
            column_type => column_type,
        }
    }
}

fn map_string(descriptor: &PropertySchema) -> ColumnType {
    match descriptor.format.as_deref() {
        Some("date-time") => return ColumnType::DateTime,
        Some("date") => return ColumnType::Date,
        Some("time") => return ColumnType::Time,
        _ => {}
    }

    match descriptor.max_length {
        // A zero length is treated like an absent one.
        None | Some(0) => ColumnType::Varchar(None),
        Some(length) if length <= MAX_BOUNDED_VARCHAR_LENGTH => {
            ColumnType::Varchar(u32::try_from(length).ok())
        }
        Some(_) => ColumnType::Text,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn descriptor(value: serde_json::Value) -> PropertySchema {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_string_formats() {
        let mapper = TypeMapper::default();

        assert_eq!(
            mapper.map_type(&PropertySchema::of(JsonType::String).with_format("date-time")),
            ColumnType::DateTime
        );
        assert_eq!(
            mapper.map_type(&PropertySchema::of(JsonType::String).with_format("date")),
            ColumnType::Date
        );
        assert_eq!(
            mapper.map_type(&PropertySchema::of(JsonType::String).with_format("time")),
            ColumnType::Time
        );
        assert_eq!(
            mapper.map_type(&PropertySchema::of(JsonType::String).with_format("email")),
            ColumnType::Varchar(None)
        );
    }

    #[test]
    fn test_string_lengths() {
        let mapper = TypeMapper::default();
        let string = PropertySchema::of(JsonType::String);

        assert_eq!(mapper.map_type(&string), ColumnType::Varchar(None));
        for length in [1, 50, 255, 7999, 8000] {
            assert_eq!(
                mapper.map_type(&string.clone().with_max_length(length)),
                ColumnType::Varchar(Some(length as u32))
            );
        }
        assert_eq!(
            mapper.map_type(&string.clone().with_max_length(8001)),
            ColumnType::Text
        );
        assert_eq!(
            mapper.map_type(&string.with_max_length(9000)),
            ColumnType::Text
        );
    }

    #[test]
    fn test_other_kinds() {
        let mapper = TypeMapper::default();

        assert_eq!(
            mapper.map_type(&PropertySchema::of(JsonType::Integer)),
            ColumnType::BigInt
        );
        assert_eq!(
            mapper.map_type(&PropertySchema::of(JsonType::Number)),
            ColumnType::Numeric {
                precision: 38,
                scale: 16
            }
        );
        assert_eq!(
            mapper.map_type(&PropertySchema::of(JsonType::Boolean)),
            ColumnType::Boolean
        );
        assert_eq!(
            mapper.map_type(&PropertySchema::of(JsonType::Object)),
            ColumnType::Varchar(None)
        );
        assert_eq!(
            mapper.map_type(&PropertySchema::of(JsonType::Array)),
            ColumnType::Json
        );
        assert_eq!(
            mapper.map_type(&PropertySchema::of(JsonType::Unknown)),
            ColumnType::Varchar(None)
        );
        assert_eq!(mapper.map_type(&PropertySchema::default()), ColumnType::Varchar(None));
    }

    #[test]
    fn test_prefer_float() {
        let mapper = TypeMapper::new(true);

        assert_eq!(
            mapper.map_type(&PropertySchema::of(JsonType::Number)),
            ColumnType::Float
        );
    }

    #[test]
    fn test_union_priority() {
        let mapper = TypeMapper::default();

        assert_eq!(
            mapper.map_type(&descriptor(json!({"type": ["null", "integer", "string"]}))),
            ColumnType::Varchar(None)
        );
        assert_eq!(
            mapper.map_type(&descriptor(json!({"type": ["number", "integer", "null"]}))),
            ColumnType::BigInt
        );
        assert_eq!(
            mapper.map_type(&descriptor(json!({
                "anyOf": [{"type": "array"}, {"type": "string", "format": "date"}]
            }))),
            ColumnType::Date
        );
    }

    #[test]
    fn test_key_override() {
        let mapper = TypeMapper::default();

        assert_eq!(
            mapper.map_column(&PropertySchema::of(JsonType::String), true),
            ColumnType::Varchar(Some(255))
        );
        assert_eq!(
            mapper.map_column(&PropertySchema::of(JsonType::String).with_max_length(20), true),
            ColumnType::Varchar(Some(255))
        );
        assert_eq!(
            mapper.map_column(&PropertySchema::of(JsonType::String), false),
            ColumnType::Varchar(None)
        );
        assert_eq!(
            mapper.map_column(&PropertySchema::of(JsonType::Integer), true),
            ColumnType::BigInt
        );
    }
}
