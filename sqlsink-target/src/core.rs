use std::path::PathBuf;

use sqlsink::session::Session;
use sqlsink::session::memory::MemorySession;
use sqlsink::target::{Target, TargetSummary};
use sqlsink_config::shared::{DestinationConfig, TargetConfig};
use sqlsink_mssql::MssqlSession;
use tokio::io::{AsyncBufRead, BufReader};
use tracing::info;

use crate::error::TargetResult;

/// Loads the record stream of `input`, or stdin, into the configured destination.
///
/// State messages are written to stdout.
pub async fn start_target_with_config(
    config: TargetConfig,
    input: Option<PathBuf>,
) -> TargetResult<TargetSummary> {
    log_config(&config);

    match input {
        Some(path) => {
            info!(path = %path.display(), "reading record stream from file");
            let file = tokio::fs::File::open(&path).await?;
            run_destination(config, BufReader::new(file)).await
        }
        None => {
            info!("reading record stream from stdin");
            run_destination(config, BufReader::new(tokio::io::stdin())).await
        }
    }
}

async fn run_destination<R>(config: TargetConfig, input: R) -> TargetResult<TargetSummary>
where
    R: AsyncBufRead + Unpin,
{
    // Static dispatch per destination.
    match config.destination.clone() {
        DestinationConfig::Memory => {
            let summary = run_target(MemorySession::new(), config, input).await?;
            Ok(summary)
        }
        DestinationConfig::Mssql(connection) => {
            let session = MssqlSession::connect(&connection).await?;
            let summary = run_target(session, config, input).await?;
            Ok(summary)
        }
    }
}

async fn run_target<S, R>(session: S, config: TargetConfig, input: R) -> TargetResult<TargetSummary>
where
    S: Session,
    R: AsyncBufRead + Unpin,
{
    let mut target = Target::new(session, config.sink, config.batch);
    let mut output = tokio::io::stdout();

    let summary = target.run(input, &mut output).await?;

    Ok(summary)
}

fn log_config(config: &TargetConfig) {
    let destination = match &config.destination {
        DestinationConfig::Memory => "memory".to_string(),
        DestinationConfig::Mssql(connection) if connection.connection_string.is_some() => {
            "mssql (connection string)".to_string()
        }
        DestinationConfig::Mssql(connection) => format!(
            "mssql {}:{}/{}",
            connection.host, connection.port, connection.database
        ),
    };

    info!(
        destination,
        prefer_float_over_numeric = config.sink.prefer_float_over_numeric,
        default_target_schema = ?config.sink.default_target_schema,
        table_prefix = ?config.sink.table_prefix,
        allow_column_add = config.sink.allow_column_add,
        allow_column_alter = config.sink.allow_column_alter,
        batch_max_size = config.batch.max_size,
        "target config"
    );
}
