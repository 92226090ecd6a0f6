//! `target-mssql` binary.
//!
//! Reads a line-delimited record stream from stdin (or `--input`), loads it into the configured
//! destination, and writes state messages to stdout once the records before them are loaded.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use sqlsink_config::shared::TargetConfig;
use sqlsink_telemetry::init_tracing;
use tracing::{error, info};

use crate::config::load_target_config;
use crate::core::start_target_with_config;
use crate::error::{TargetError, TargetResult};

mod config;
mod core;
mod error;

/// Command line arguments of the target.
#[derive(Debug, Parser)]
#[command(name = "target-mssql", version, about = "Loads a record stream into SQL Server")]
struct Args {
    /// Configuration file (YAML or JSON). Defaults to `configuration/base.*`.
    #[arg(long)]
    config: Option<PathBuf>,
    /// File to read the record stream from instead of stdin.
    #[arg(long)]
    input: Option<PathBuf>,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprint!("{}", err.render_report());
            ExitCode::FAILURE
        }
    }
}

fn run() -> TargetResult<()> {
    let args = Args::parse();
    let config = load_target_config(args.config.as_deref())?;

    // Flushes buffered logs on drop.
    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME")).map_err(TargetError::config)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(config, args.input))
}

async fn async_main(config: TargetConfig, input: Option<PathBuf>) -> TargetResult<()> {
    match start_target_with_config(config, input).await {
        Ok(summary) => {
            info!(
                messages = summary.messages,
                records = summary.records,
                batches = summary.batches,
                states = summary.states_emitted,
                "target completed"
            );
            Ok(())
        }
        Err(err) => {
            error!("{err}");
            Err(err)
        }
    }
}
