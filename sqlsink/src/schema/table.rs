use std::collections::HashMap;

use crate::bail;
use crate::conversions::name::{IdentifierKind, conform_name};
use crate::error::{ErrorKind, SinkResult};
use crate::schema::TypeMapper;
use crate::types::{ColumnSchema, StreamSchema, TableName, TableSchema};

/// Destination table shape of a stream, together with the property each column comes from.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamTable {
    schema: TableSchema,
    /// Source property name of each column, in column order.
    properties: Vec<String>,
    /// Indexes of the columns every record must carry.
    required: Vec<usize>,
}

impl StreamTable {
    /// Resolves the columns of `name` from a stream schema and its key properties.
    ///
    /// Every property becomes a column, in declaration order. Fails with
    /// [`ErrorKind::InvalidSchema`] when two properties conform to the same column name or when a
    /// key property is not declared.
    pub fn build(
        name: TableName,
        stream_schema: &StreamSchema,
        key_properties: &[String],
        mapper: &TypeMapper,
    ) -> SinkResult<Self> {
        for key in key_properties {
            if !stream_schema
                .properties()
                .iter()
                .any(|(property, _)| property == key)
            {
                bail!(
                    ErrorKind::InvalidSchema,
                    "Key property is not declared in the stream schema",
                    format!("key `{key}` of table `{name}`")
                );
            }
        }

        let mut columns = Vec::with_capacity(stream_schema.len());
        let mut properties = Vec::with_capacity(stream_schema.len());
        let mut seen: HashMap<String, &str> = HashMap::with_capacity(stream_schema.len());

        for (property, descriptor) in stream_schema.properties() {
            let column_name = conform_name(property, IdentifierKind::Column)?;
            if let Some(previous) = seen.insert(column_name.clone(), property.as_str()) {
                bail!(
                    ErrorKind::InvalidSchema,
                    "Properties conform to the same column name",
                    format!(
                        "`{previous}` and `{property}` both map to column `{column_name}` of table `{name}`"
                    )
                );
            }

            let is_key = key_properties.contains(property);
            columns.push(ColumnSchema::new(
                column_name,
                mapper.map_column(descriptor, is_key),
                is_key,
            ));
            properties.push(property.clone());
        }

        let required = properties
            .iter()
            .enumerate()
            .filter(|(_, property)| stream_schema.required().contains(*property))
            .map(|(index, _)| index)
            .collect();

        Ok(Self {
            schema: TableSchema::new(name, columns),
            properties,
            required,
        })
    }

    pub fn name(&self) -> &TableName {
        &self.schema.name
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Returns the source property of every column, in column order.
    pub fn properties(&self) -> &[String] {
        &self.properties
    }

    pub fn is_required(&self, column_index: usize) -> bool {
        self.required.contains(&column_index)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::ColumnType;

    fn stream_schema(value: serde_json::Value) -> StreamSchema {
        StreamSchema::from_json(&value).unwrap()
    }

    #[test]
    fn test_build_columns() {
        let schema = stream_schema(json!({
            "properties": {
                "userId": {"type": "string"},
                "Full Name": {"type": ["null", "string"], "maxLength": 50},
                "createdAt": {"type": "string", "format": "date-time"},
                "tags": {"type": "array"}
            },
            "required": ["Full Name"]
        }));

        let table = StreamTable::build(
            TableName::new(None, "users"),
            &schema,
            &["userId".to_string()],
            &TypeMapper::default(),
        )
        .unwrap();

        assert_eq!(
            table.schema().columns,
            vec![
                ColumnSchema::new("user_id", ColumnType::Varchar(Some(255)), true),
                ColumnSchema::new("full_name", ColumnType::Varchar(Some(50)), false),
                ColumnSchema::new("created_at", ColumnType::DateTime, false),
                ColumnSchema::new("tags", ColumnType::Json, false),
            ]
        );
        assert_eq!(table.properties()[1], "Full Name");
        assert!(table.is_required(1));
        assert!(!table.is_required(0));
    }

    #[test]
    fn test_conformed_name_clash() {
        let schema = stream_schema(json!({
            "properties": {"userName": {"type": "string"}, "user_name": {"type": "string"}}
        }));

        let err = StreamTable::build(
            TableName::new(None, "users"),
            &schema,
            &[],
            &TypeMapper::default(),
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidSchema);
    }

    #[test]
    fn test_undeclared_key() {
        let schema = stream_schema(json!({"properties": {"name": {"type": "string"}}}));

        let err = StreamTable::build(
            TableName::new(None, "users"),
            &schema,
            &["id".to_string()],
            &TypeMapper::default(),
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidSchema);
    }
}
