use std::path::Path;

use sqlsink_config::shared::TargetConfig;
use sqlsink_config::{load_config, load_config_from};

use crate::error::{TargetError, TargetResult};

/// Loads and validates the target configuration.
///
/// Reads `path` when given, otherwise the `configuration/base` file of the working directory.
/// `APP_`-prefixed environment variables override both.
pub fn load_target_config(path: Option<&Path>) -> TargetResult<TargetConfig> {
    let config = match path {
        Some(path) => load_config_from::<TargetConfig>(path),
        None => load_config::<TargetConfig>(),
    }
    .map_err(TargetError::config)?;
    config.validate().map_err(TargetError::config)?;

    Ok(config)
}
