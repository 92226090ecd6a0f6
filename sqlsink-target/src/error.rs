use sqlsink::error::SinkError;
use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt;

/// Returns whether terminal output should include backtraces.
fn should_render_backtrace() -> bool {
    matches!(
        std::env::var("RUST_BACKTRACE").as_deref(),
        Ok("1") | Ok("full")
    )
}

/// Result type for target operations.
pub type TargetResult<T> = Result<T, TargetError>;

/// Captured backtrace wrapper to avoid thiserror's unstable feature detection.
pub struct CapturedBacktrace(Backtrace);

impl CapturedBacktrace {
    fn capture() -> Self {
        Self(Backtrace::capture())
    }
}

impl fmt::Debug for CapturedBacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type of the target binary.
///
/// Wraps [`SinkError`] for loading errors and adds the errors raised while setting the
/// process up.
#[derive(Debug)]
pub enum TargetError {
    /// Loading error.
    Sink(SinkError),
    /// Configuration or startup error.
    Config(Box<dyn Error + Send + Sync>, CapturedBacktrace),
    /// I/O error.
    Io(std::io::Error, CapturedBacktrace),
}

impl TargetError {
    /// Returns a short category label for this error.
    pub fn category(&self) -> &'static str {
        match self {
            TargetError::Sink(_) => "load error",
            TargetError::Config(_, _) => "configuration error",
            TargetError::Io(_, _) => "i/o error",
        }
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self {
            TargetError::Sink(err) => err.backtrace(),
            TargetError::Config(_, cb) => Some(&cb.0),
            TargetError::Io(_, cb) => Some(&cb.0),
        }
    }

    /// Creates a configuration error from any source.
    pub fn config<E: Error + Send + Sync + 'static>(err: E) -> Self {
        TargetError::Config(Box::new(err), CapturedBacktrace::capture())
    }

    /// Returns a user-oriented report for terminal output.
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        out.push_str("target-mssql failed\n");
        out.push_str(&format!("category: {}\n", self.category()));
        out.push_str(&format!("error: {self}\n"));

        if !matches!(self, TargetError::Sink(err) if err.errors().len() > 1) {
            let mut source = Error::source(self);
            let mut idx = 1usize;
            while let Some(err) = source {
                out.push_str(&format!("cause {idx}: {err}\n"));
                source = err.source();
                idx += 1;
            }
        }

        if should_render_backtrace()
            && let Some(backtrace) = self.backtrace()
        {
            out.push_str("backtrace:\n");
            out.push_str(&backtrace.to_string());
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }

        out
    }
}

impl fmt::Display for TargetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetError::Sink(err) => write!(f, "{err}"),
            TargetError::Config(source, _) => write!(f, "configuration error: {source}"),
            TargetError::Io(source, _) => write!(f, "i/o error: {source}"),
        }
    }
}

impl Error for TargetError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TargetError::Sink(err) => err.source(),
            TargetError::Config(source, _) => Some(source.as_ref()),
            TargetError::Io(source, _) => Some(source),
        }
    }
}

impl From<std::io::Error> for TargetError {
    fn from(err: std::io::Error) -> Self {
        TargetError::Io(err, CapturedBacktrace::capture())
    }
}

impl From<SinkError> for TargetError {
    fn from(err: SinkError) -> Self {
        TargetError::Sink(err)
    }
}
