use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A field holds a value outside of its accepted domain.
    #[error("invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
    /// A field required by the selected destination is missing or empty.
    #[error("`{0}` must be set for the selected destination")]
    MissingField(String),
}
