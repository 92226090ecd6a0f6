use serde_json::{Value, json};

/// Builds a `SCHEMA` line declaring `properties` with the given key properties.
pub fn schema_line(stream: &str, properties: Value, key_properties: &[&str]) -> String {
    json!({
        "type": "SCHEMA",
        "stream": stream,
        "schema": { "type": "object", "properties": properties },
        "key_properties": key_properties,
    })
    .to_string()
}

/// Builds a `SCHEMA` line from a complete JSON schema.
pub fn raw_schema_line(stream: &str, schema: Value, key_properties: &[&str]) -> String {
    json!({
        "type": "SCHEMA",
        "stream": stream,
        "schema": schema,
        "key_properties": key_properties,
    })
    .to_string()
}

pub fn record_line(stream: &str, record: Value) -> String {
    json!({ "type": "RECORD", "stream": stream, "record": record }).to_string()
}

pub fn state_line(value: Value) -> String {
    json!({ "type": "STATE", "value": value }).to_string()
}

pub fn activate_version_line(stream: &str, version: u64) -> String {
    json!({ "type": "ACTIVATE_VERSION", "stream": stream, "version": version }).to_string()
}
