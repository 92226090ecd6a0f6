//! Error types and result definitions for sink operations.
//!
//! [`SinkError`] classifies every failure with an [`ErrorKind`] and captures the callsite and a
//! backtrace. Several errors can be aggregated into one, which the loader uses when a merge fails
//! and releasing the staging table fails afterwards.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Result type for sink operations.
pub type SinkResult<T> = Result<T, SinkError>;

/// Metadata stored for a single [`SinkError`].
#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type of the sink.
#[derive(Debug, Clone)]
pub struct SinkError {
    repr: ErrorRepr,
}

#[derive(Debug, Clone)]
enum ErrorRepr {
    Single(ErrorPayload),
    Many {
        errors: Vec<SinkError>,
        location: &'static Location<'static>,
    },
}

/// Categories of failures raised while loading record streams.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Schema & type errors
    InvalidSchema,
    IncompatibleTypes,
    MissingStreamSchema,

    // DDL & DML errors
    UnsupportedOperation,
    DdlExecutionFailed,
    MergeExecutionFailed,

    // Destination errors
    DestinationConnectionFailed,
    DestinationQueryFailed,

    // Data errors
    InvalidData,
    ConversionError,

    // Configuration errors
    ConfigError,

    // IO & serialization errors
    IoError,
    SerializationError,
    DeserializationError,

    // State errors
    InvalidState,

    Unknown,
}

impl SinkError {
    /// Returns the [`ErrorKind`] of this error.
    ///
    /// Aggregated errors report the kind of their first error, or [`ErrorKind::Unknown`] when empty.
    pub fn kind(&self) -> ErrorKind {
        match &self.repr {
            ErrorRepr::Single(payload) => payload.kind,
            ErrorRepr::Many { errors, .. } => errors
                .first()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns every [`ErrorKind`] contained in this error, flattening aggregates.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match &self.repr {
            ErrorRepr::Single(payload) => vec![payload.kind],
            ErrorRepr::Many { errors, .. } => errors.iter().flat_map(|err| err.kinds()).collect(),
        }
    }

    /// Returns the static description of this error.
    ///
    /// Aggregated errors return the description of their first error.
    pub fn description(&self) -> &str {
        match &self.repr {
            ErrorRepr::Single(payload) => &payload.description,
            ErrorRepr::Many { errors, .. } => errors
                .first()
                .map(|err| err.description())
                .unwrap_or("aggregated errors"),
        }
    }

    /// Returns the dynamic detail of this error, if any.
    ///
    /// Aggregated errors return the first detail found among their errors.
    pub fn detail(&self) -> Option<&str> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload.detail.as_deref(),
            ErrorRepr::Many { errors, .. } => errors.iter().find_map(|err| err.detail()),
        }
    }

    /// Returns the captured backtrace of a single error.
    pub fn backtrace(&self) -> Option<&Backtrace> {
        match &self.repr {
            ErrorRepr::Single(payload) => Some(payload.backtrace.as_ref()),
            ErrorRepr::Many { .. } => None,
        }
    }

    /// Returns the callsite where this error was created.
    pub fn location(&self) -> &'static Location<'static> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload.location,
            ErrorRepr::Many { location, .. } => location,
        }
    }

    /// Returns the errors held by an aggregate, or a slice with only `self` otherwise.
    pub fn errors(&self) -> &[SinkError] {
        match &self.repr {
            ErrorRepr::Single(_) => std::slice::from_ref(self),
            ErrorRepr::Many { errors, .. } => errors,
        }
    }

    /// Attaches the originating error, exposed through [`error::Error::source`].
    ///
    /// Has no effect on aggregated errors, which forward their first error as source.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        if let ErrorRepr::Single(payload) = &mut self.repr {
            payload.source = Some(Arc::new(source));
        }

        self
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        SinkError {
            repr: ErrorRepr::Single(ErrorPayload {
                kind,
                description,
                detail,
                source,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            }),
        }
    }

    #[track_caller]
    fn from_source<E>(kind: ErrorKind, description: &'static str, err: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        let detail = err.to_string();
        SinkError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl PartialEq for SinkError {
    fn eq(&self, other: &SinkError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::Single(a), ErrorRepr::Single(b)) => a.kind == b.kind,
            (ErrorRepr::Many { errors: a, .. }, ErrorRepr::Many { errors: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            ErrorRepr::Single(payload) => {
                let location = payload.location;
                write!(
                    f,
                    "[{:?}] {} @ {}:{}:{}",
                    payload.kind,
                    payload.description,
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                if let Some(detail) = payload.detail.as_deref() {
                    write_block(f, "Detail", detail)?;
                }

                let backtrace = payload.backtrace.to_string();
                if !backtrace.trim().is_empty() {
                    write_block(f, "Backtrace", &backtrace)?;
                }

                Ok(())
            }
            ErrorRepr::Many { errors, location } => {
                let count = errors.len();
                write!(
                    f,
                    "[Many] {} error{} aggregated @ {}:{}:{}",
                    count,
                    if count == 1 { "" } else { "s" },
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                for (index, error) in errors.iter().enumerate() {
                    let rendered = error.to_string();
                    let mut lines = rendered.lines();
                    write!(f, "\n  {}. {}", index + 1, lines.next().unwrap_or_default())?;

                    for line in lines {
                        write!(f, "\n     {line}")?;
                    }
                }

                Ok(())
            }
        }
    }
}

impl error::Error for SinkError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload
                .source
                .as_ref()
                .map(|source| source.as_ref() as &(dyn error::Error + 'static)),
            ErrorRepr::Many { errors, .. } => errors
                .first()
                .map(|error| error as &(dyn error::Error + 'static)),
        }
    }
}

/// Writes an indented, titled block of lines.
fn write_block(f: &mut fmt::Formatter<'_>, title: &str, body: &str) -> fmt::Result {
    if body.trim().is_empty() {
        return write!(f, "\n  {title}: <empty>");
    }

    write!(f, "\n  {title}:")?;
    for line in body.lines() {
        if line.trim().is_empty() {
            write!(f, "\n    ")?;
        } else {
            write!(f, "\n    {line}")?;
        }
    }

    Ok(())
}

impl From<(ErrorKind, &'static str)> for SinkError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> SinkError {
        SinkError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

impl<D> From<(ErrorKind, &'static str, D)> for SinkError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> SinkError {
        SinkError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Aggregates several errors into one.
///
/// A vector holding exactly one error yields that error unchanged.
impl<E> From<Vec<E>> for SinkError
where
    E: Into<SinkError>,
{
    #[track_caller]
    fn from(errors: Vec<E>) -> SinkError {
        let location = Location::caller();
        let mut errors: Vec<SinkError> = errors.into_iter().map(Into::into).collect();

        if errors.len() == 1
            && let Some(error) = errors.pop()
        {
            return error;
        }

        SinkError {
            repr: ErrorRepr::Many { errors, location },
        }
    }
}

impl From<std::io::Error> for SinkError {
    #[track_caller]
    fn from(err: std::io::Error) -> SinkError {
        SinkError::from_source(ErrorKind::IoError, "I/O operation failed", err)
    }
}

/// Classifies JSON failures as I/O or deserialization errors.
impl From<serde_json::Error> for SinkError {
    #[track_caller]
    fn from(err: serde_json::Error) -> SinkError {
        let (kind, description) = match err.classify() {
            serde_json::error::Category::Io => (ErrorKind::IoError, "JSON I/O operation failed"),
            serde_json::error::Category::Syntax
            | serde_json::error::Category::Data
            | serde_json::error::Category::Eof => (
                ErrorKind::DeserializationError,
                "JSON deserialization failed",
            ),
        };

        SinkError::from_source(kind, description, err)
    }
}

impl From<chrono::ParseError> for SinkError {
    #[track_caller]
    fn from(err: chrono::ParseError) -> SinkError {
        SinkError::from_source(ErrorKind::ConversionError, "Datetime parsing failed", err)
    }
}

impl From<bigdecimal::ParseBigDecimalError> for SinkError {
    #[track_caller]
    fn from(err: bigdecimal::ParseBigDecimalError) -> SinkError {
        SinkError::from_source(ErrorKind::ConversionError, "Numeric parsing failed", err)
    }
}
