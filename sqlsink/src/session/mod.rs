//! Database session abstractions.
//!
//! The [`Session`] trait is the capability set the reconciler and the staged loader rely on.
//! Dialect crates implement it over a live connection, and [`memory::MemorySession`] implements
//! it over in-memory tables.

mod base;
pub mod memory;

pub use base::Session;
