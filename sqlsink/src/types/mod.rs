//! Common types used throughout the sink.
//!
//! Includes the property descriptors received in SCHEMA messages, the concrete column type
//! vocabulary, typed row values, and destination table names.

mod cell;
mod column;
mod descriptor;
mod table;

pub use cell::*;
pub use column::*;
pub use descriptor::*;
pub use table::*;

/// A record as received in a RECORD message.
pub type Record = serde_json::Map<String, serde_json::Value>;
