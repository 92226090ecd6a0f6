//! Helpers for building record streams and running them in tests.

pub mod messages;
pub mod target;
