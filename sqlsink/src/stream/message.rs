use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SinkResult;
use crate::types::{Record, StreamSchema};

/// A message of the record stream, tagged by its `type` field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    Schema(SchemaMessage),
    Record(RecordMessage),
    State(StateMessage),
    ActivateVersion(ActivateVersionMessage),
}

/// Declares the properties and key columns of a stream.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SchemaMessage {
    pub stream: String,
    pub schema: Value,
    #[serde(default)]
    pub key_properties: Vec<String>,
}

impl SchemaMessage {
    /// Parses the JSON schema carried by this message.
    pub fn stream_schema(&self) -> SinkResult<StreamSchema> {
        StreamSchema::from_json(&self.schema)
    }
}

/// Carries a single record of a stream.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecordMessage {
    pub stream: String,
    pub record: Record,
    #[serde(default)]
    pub time_extracted: Option<String>,
}

/// Opaque checkpoint, echoed back once every record before it has been loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateMessage {
    pub value: Value,
}

impl StateMessage {
    /// Renders the message as a single output line, without the trailing newline.
    pub fn to_line(&self) -> SinkResult<String> {
        #[derive(Serialize)]
        struct Line<'a> {
            #[serde(rename = "type")]
            kind: &'static str,
            value: &'a Value,
        }

        let line = serde_json::to_string(&Line {
            kind: "STATE",
            value: &self.value,
        })?;

        Ok(line)
    }
}

/// Announces a new table version of a stream.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ActivateVersionMessage {
    pub stream: String,
    pub version: u64,
}
