use secrecy::ExposeSecret;
use sqlsink::error::{ErrorKind, SinkError, SinkResult};
use sqlsink::sink_error;
use sqlsink_config::shared::MssqlConnectionConfig;
use tiberius::{AuthMethod, Client, Config};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::info;

/// A `tiberius` client over a `tokio` TCP stream.
pub type MssqlClient = Client<Compat<TcpStream>>;

/// Builds the driver configuration of a connection.
///
/// A connection string takes precedence over the discrete fields.
pub fn build_config(config: &MssqlConnectionConfig) -> SinkResult<Config> {
    if let Some(connection_string) = &config.connection_string {
        return Config::from_ado_string(connection_string.expose_secret()).map_err(|err| {
            sink_error!(
                ErrorKind::ConfigError,
                "Invalid SQL Server connection string",
                err.to_string(),
                source: err
            )
        });
    }

    let mut tiberius_config = Config::new();
    tiberius_config.host(&config.host);
    tiberius_config.port(config.port);
    tiberius_config.database(&config.database);
    tiberius_config.application_name(&config.application_name);

    let password = config
        .password
        .as_ref()
        .map(|password| password.expose_secret().as_str())
        .unwrap_or_default();
    tiberius_config.authentication(AuthMethod::sql_server(&config.username, password));

    if config.trust_server_certificate {
        tiberius_config.trust_cert();
    }

    Ok(tiberius_config)
}

/// Opens a connection to SQL Server.
pub async fn connect(config: &MssqlConnectionConfig) -> SinkResult<MssqlClient> {
    let tiberius_config = build_config(config)?;
    let address = tiberius_config.get_addr();

    let tcp = TcpStream::connect(&address).await.map_err(|err| {
        sink_error!(
            ErrorKind::DestinationConnectionFailed,
            "Failed to reach SQL Server",
            format!("{address}: {err}"),
            source: err
        )
    })?;
    tcp.set_nodelay(true)?;

    let client = Client::connect(tiberius_config, tcp.compat_write())
        .await
        .map_err(|err| driver_error(ErrorKind::DestinationConnectionFailed, "Failed to connect to SQL Server", err))?;

    info!(%address, "connected to sql server");

    Ok(client)
}

/// Wraps a driver error into a [`SinkError`] of `kind`.
pub(crate) fn driver_error(
    kind: ErrorKind,
    description: &'static str,
    err: tiberius::error::Error,
) -> SinkError {
    sink_error!(kind, description, err.to_string(), source: err)
}
