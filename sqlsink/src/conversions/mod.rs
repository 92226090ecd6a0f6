//! Conversions from stream identifiers and values to their destination form.

pub mod name;
pub mod record;
