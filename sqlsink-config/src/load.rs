use std::{
    io,
    path::{Path, PathBuf},
};

use serde::de::DeserializeOwned;
use thiserror::Error;

/// Directory searched for the base configuration file when no explicit path is given.
const CONFIGURATION_DIR: &str = "configuration";

/// Stem of the base configuration file.
const BASE_FILE_STEM: &str = "base";

/// Supported extensions for the base configuration file.
const CONFIG_FILE_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Prefix for environment variable configuration overrides.
const ENV_PREFIX: &str = "APP";

/// Separator between environment variable prefix and key segments.
const ENV_PREFIX_SEPARATOR: &str = "_";

/// Separator for nested configuration keys in environment variables.
const ENV_SEPARATOR: &str = "__";

/// Separator for list elements in environment variables.
const LIST_SEPARATOR: &str = ",";

/// Trait implemented by configuration structures that require list parsing help.
pub trait Config {
    /// Keys whose values should be parsed as lists when loading the configuration.
    const LIST_PARSE_KEYS: &'static [&'static str];
}

/// Errors that can occur while loading configuration files and overrides.
#[derive(Debug, Error)]
pub enum LoadConfigError {
    /// Failed to determine the current working directory.
    #[error("failed to determine the current directory: {0}")]
    CurrentDir(#[source] io::Error),

    /// An explicitly requested configuration file does not exist.
    #[error("configuration file `{0}` does not exist")]
    MissingConfigurationFile(PathBuf),

    /// No base configuration file was found in the configuration directory.
    #[error("could not locate a base configuration in `{directory}`; attempted: {attempted}")]
    BaseConfigurationMissing { directory: PathBuf, attempted: String },

    /// A configuration file existed but could not be parsed.
    #[error("failed to load configuration from `{path}`: {source}")]
    ConfigurationFileLoad {
        path: PathBuf,
        source: config::ConfigError,
    },

    /// The merged sources could not be built into a configuration.
    #[error("failed to build configuration: {0}")]
    Builder(#[source] config::ConfigError),

    /// The configuration was parsed but deserialization failed.
    #[error("failed to deserialize configuration: {0}")]
    Deserialization(#[source] config::ConfigError),
}

/// Loads the configuration from `configuration/base.(yaml|yml|json)` in the current directory.
///
/// See [`load_config_from`] for the override rules.
pub fn load_config<T>() -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    let base_path = std::env::current_dir().map_err(LoadConfigError::CurrentDir)?;
    let path = find_base_file(&base_path.join(CONFIGURATION_DIR))?;

    load_config_from(&path)
}

/// Loads the configuration from the file at `path` and applies environment overrides.
///
/// Variables prefixed with `APP_` override file values. Nested keys use double underscores
/// (`APP_DESTINATION__MSSQL__HOST`), and list values are comma-separated.
pub fn load_config_from<T>(path: &Path) -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    if !path.is_file() {
        return Err(LoadConfigError::MissingConfigurationFile(path.to_path_buf()));
    }

    let file_builder = config::Config::builder().add_source(config::File::from(path));
    file_builder
        .clone()
        .build()
        .map_err(|source| LoadConfigError::ConfigurationFileLoad {
            path: path.to_path_buf(),
            source,
        })?;

    let settings = file_builder
        .add_source(environment_source::<T>())
        .build()
        .map_err(LoadConfigError::Builder)?;

    settings
        .try_deserialize::<T>()
        .map_err(LoadConfigError::Deserialization)
}

fn environment_source<T: Config>() -> config::Environment {
    // Values must be parsed so that numeric and boolean overrides match the file types.
    let mut source = config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_PREFIX_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .try_parsing(true);

    if !T::LIST_PARSE_KEYS.is_empty() {
        source = source.list_separator(LIST_SEPARATOR);

        for key in T::LIST_PARSE_KEYS {
            source = source.with_list_parse_key(key);
        }
    }

    source
}

/// Finds the base configuration file among the supported extensions.
fn find_base_file(directory: &Path) -> Result<PathBuf, LoadConfigError> {
    let mut attempted_paths = Vec::with_capacity(CONFIG_FILE_EXTENSIONS.len());

    for extension in CONFIG_FILE_EXTENSIONS {
        let path = directory.join(format!("{BASE_FILE_STEM}.{extension}"));
        if path.is_file() {
            return Ok(path);
        }

        attempted_paths.push(path);
    }

    let attempted = attempted_paths
        .iter()
        .map(|path| format!("`{}`", path.display()))
        .collect::<Vec<_>>()
        .join(", ");

    Err(LoadConfigError::BaseConfigurationMissing {
        directory: directory.to_path_buf(),
        attempted,
    })
}
