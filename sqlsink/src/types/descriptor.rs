use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::bail;
use crate::error::{ErrorKind, SinkResult};

/// Kind of value a property descriptor declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
    Null,
    #[serde(other)]
    Unknown,
}

/// Loosely typed description of a single property.
///
/// A descriptor can declare several kinds, either through a `type` list or through `anyOf`
/// alternatives, which is how nullable and union properties are usually expressed.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertySchema {
    #[serde(default, rename = "type", deserialize_with = "one_or_many")]
    pub types: Vec<JsonType>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u64>,
    #[serde(default)]
    pub any_of: Vec<PropertySchema>,
}

impl PropertySchema {
    /// Creates a descriptor declaring a single kind.
    pub fn of(json_type: JsonType) -> Self {
        Self {
            types: vec![json_type],
            ..Self::default()
        }
    }

    /// Sets the `format` of this descriptor.
    pub fn with_format(mut self, format: &str) -> Self {
        self.format = Some(format.to_string());
        self
    }

    /// Sets the `maxLength` of this descriptor.
    pub fn with_max_length(mut self, max_length: u64) -> Self {
        self.max_length = Some(max_length);
        self
    }

    /// Returns `true` if the descriptor or any of its `anyOf` alternatives declares `json_type`.
    pub fn declares(&self, json_type: JsonType) -> bool {
        self.types.contains(&json_type) || self.any_of.iter().any(|alt| alt.declares(json_type))
    }

    /// Returns the descriptor that declares `json_type`, looking through `anyOf` alternatives.
    pub fn variant(&self, json_type: JsonType) -> Option<&PropertySchema> {
        if self.types.contains(&json_type) {
            return Some(self);
        }

        self.any_of.iter().find_map(|alt| alt.variant(json_type))
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<JsonType>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(JsonType),
        Many(Vec<JsonType>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(json_type) => vec![json_type],
        OneOrMany::Many(types) => types,
    })
}

/// Ordered property descriptors of a stream, as declared by a SCHEMA message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamSchema {
    properties: Vec<(String, PropertySchema)>,
    required: Vec<String>,
}

impl StreamSchema {
    /// Creates a schema from properties in declaration order.
    pub fn new(properties: Vec<(String, PropertySchema)>) -> Self {
        Self {
            properties,
            required: Vec::new(),
        }
    }

    /// Marks properties that every record must carry.
    pub fn with_required(mut self, required: Vec<String>) -> Self {
        self.required = required;
        self
    }

    /// Parses the JSON schema object carried by a SCHEMA message.
    ///
    /// The object must contain a `properties` object. Property order is preserved.
    pub fn from_json(schema: &Value) -> SinkResult<Self> {
        let Some(properties) = schema.get("properties") else {
            bail!(
                ErrorKind::InvalidSchema,
                "Stream schema has no properties object"
            );
        };
        let Some(properties) = properties.as_object() else {
            bail!(
                ErrorKind::InvalidSchema,
                "Stream schema properties are not an object",
                properties
            );
        };

        let mut parsed = Vec::with_capacity(properties.len());
        for (name, descriptor) in properties {
            let descriptor = PropertySchema::deserialize(descriptor).map_err(|err| {
                crate::sink_error!(
                    ErrorKind::InvalidSchema,
                    "Property descriptor is malformed",
                    format!("property `{name}`: {err}"),
                    source: err
                )
            })?;
            parsed.push((name.clone(), descriptor));
        }

        let required = match schema.get("required") {
            Some(Value::Array(values)) => values
                .iter()
                .filter_map(|value| value.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        };

        Ok(Self::new(parsed).with_required(required))
    }

    /// Returns the properties in declaration order.
    pub fn properties(&self) -> &[(String, PropertySchema)] {
        &self.properties
    }

    /// Returns the names of properties every record must carry.
    pub fn required(&self) -> &[String] {
        &self.required
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }
}
