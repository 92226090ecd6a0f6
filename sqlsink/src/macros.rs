//! Macros for building and returning [`crate::error::SinkError`] values.

/// Creates a [`crate::error::SinkError`] from an error kind and a static description.
///
/// An optional dynamic detail (anything implementing [`ToString`], or `detail = <owned string>`)
/// and an optional source error can follow.
#[macro_export]
macro_rules! sink_error {
    ($kind:expr, $desc:expr) => {
        $crate::error::SinkError::from(($kind, $desc))
    };
    ($kind:expr, $desc:expr, source: $source:expr) => {
        $crate::error::SinkError::from(($kind, $desc)).with_source($source)
    };
    ($kind:expr, $desc:expr, detail = $detail:expr) => {
        $crate::error::SinkError::from(($kind, $desc, $detail))
    };
    ($kind:expr, $desc:expr, detail = $detail:expr, source: $source:expr) => {
        $crate::error::SinkError::from(($kind, $desc, $detail)).with_source($source)
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        $crate::error::SinkError::from(($kind, $desc, $detail.to_string()))
    };
    ($kind:expr, $desc:expr, $detail:expr, source: $source:expr) => {
        $crate::error::SinkError::from(($kind, $desc, $detail.to_string())).with_source($source)
    };
}

/// Returns early with a [`crate::error::SinkError`] built by [`sink_error!`].
#[macro_export]
macro_rules! bail {
    ($kind:expr, $desc:expr $(, $($rest:tt)+)?) => {
        return ::core::result::Result::Err($crate::sink_error!($kind, $desc $(, $($rest)+)?))
    };
}
