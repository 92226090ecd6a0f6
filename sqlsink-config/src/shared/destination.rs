use secrecy::SecretString;
use serde::Deserialize;

use crate::shared::ValidationError;

/// Configuration for the supported destinations.
///
/// This intentionally does not implement [`serde::Serialize`] to avoid accidentally
/// leaking secrets in the config into serialized forms.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationConfig {
    /// In-memory destination, useful for dry runs of a stream against an empty catalog.
    Memory,
    /// Microsoft SQL Server destination.
    Mssql(MssqlConnectionConfig),
}

impl DestinationConfig {
    /// Validates the destination configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            DestinationConfig::Memory => Ok(()),
            DestinationConfig::Mssql(config) => config.validate(),
        }
    }
}

/// Connection settings for a SQL Server database.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MssqlConnectionConfig {
    /// Server host name or address.
    #[serde(default)]
    pub host: String,
    /// Server TCP port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Database the tables are written to.
    #[serde(default)]
    pub database: String,
    /// SQL Server login name.
    #[serde(default)]
    pub username: String,
    /// SQL Server login password.
    #[serde(default)]
    pub password: Option<SecretString>,
    /// Accepts the server certificate without validating it.
    #[serde(default)]
    pub trust_server_certificate: bool,
    /// ADO.NET style connection string. When set, every other connection field is ignored.
    #[serde(default)]
    pub connection_string: Option<SecretString>,
    /// Application name reported to the server.
    #[serde(default = "default_application_name")]
    pub application_name: String,
}

impl MssqlConnectionConfig {
    /// Default SQL Server port.
    pub const DEFAULT_PORT: u16 = 1433;

    /// Default application name reported to the server.
    pub const DEFAULT_APPLICATION_NAME: &'static str = "sqlsink";

    /// Validates that either a connection string or the discrete connection fields are present.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.connection_string.is_some() {
            return Ok(());
        }

        for (field, value) in [
            ("destination.mssql.host", &self.host),
            ("destination.mssql.database", &self.database),
            ("destination.mssql.username", &self.username),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::MissingField(field.to_string()));
            }
        }

        Ok(())
    }
}

const fn default_port() -> u16 {
    MssqlConnectionConfig::DEFAULT_PORT
}

fn default_application_name() -> String {
    MssqlConnectionConfig::DEFAULT_APPLICATION_NAME.to_string()
}
