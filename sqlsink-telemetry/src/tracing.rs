//! Tracing subscriber setup.
//!
//! Logs always go to stderr: stdout carries the state messages of the record stream.

use std::sync::Once;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable enabling log output in tests.
pub const ENABLE_TRACING_ENV: &str = "ENABLE_TRACING";

/// Filter used when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "info";

static TEST_TRACING: Once = Once::new();

/// Errors raised while installing the global subscriber.
#[derive(Debug, Error)]
pub enum TracingError {
    #[error("failed to install the global tracing subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Installs the global subscriber of the application.
///
/// The returned guard flushes buffered log lines when dropped, so it must live as long as the
/// process does.
pub fn init_tracing(app_name: &str) -> Result<WorkerGuard, TracingError> {
    let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer).with_target(true))
        .try_init()?;

    ::tracing::info!(app = app_name, "tracing initialized");

    Ok(guard)
}

/// Installs a test subscriber once per process when `ENABLE_TRACING` is set.
pub fn init_test_tracing() {
    TEST_TRACING.call_once(|| {
        if std::env::var_os(ENABLE_TRACING_ENV).is_none() {
            return;
        }

        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_test_writer())
            .try_init();
    });
}
