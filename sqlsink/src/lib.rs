//! Loads a line-delimited record stream into relational tables.
//!
//! Streams are described by `SCHEMA` messages and filled by `RECORD` messages. Each stream maps to
//! one destination table whose columns are inferred from the stream schema and evolved as the
//! schema changes. Keyed streams are upserted through a staging table and a single merge.

pub mod conversions;
pub mod error;
pub mod loader;
mod macros;
pub mod reconcile;
pub mod schema;
pub mod session;
pub mod sink;
pub mod stream;
pub mod target;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
