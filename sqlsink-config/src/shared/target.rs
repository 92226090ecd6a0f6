use serde::Deserialize;

use crate::Config;
use crate::shared::{BatchConfig, DestinationConfig, SinkConfig, ValidationError};

/// Complete configuration for the target binary.
///
/// This intentionally does not implement [`serde::Serialize`] to avoid accidentally
/// leaking secrets in the config into serialized forms.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    /// Where the streams are materialized.
    pub destination: DestinationConfig,
    /// Table mapping and DDL evolution options.
    #[serde(default)]
    pub sink: SinkConfig,
    /// Record batching options.
    #[serde(default)]
    pub batch: BatchConfig,
}

impl TargetConfig {
    /// Validates the complete target configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.destination.validate()?;
        self.sink.validate()?;
        self.batch.validate()
    }
}

impl Config for TargetConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}
