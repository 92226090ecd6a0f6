//! SQL Server sessions for `sqlsink`.

pub mod catalog;
mod client;
mod core;
pub mod encoding;
pub mod sql;

pub use client::{MssqlClient, build_config, connect};
pub use self::core::MssqlSession;
