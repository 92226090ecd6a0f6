pub mod tracing;

pub use tracing::{init_test_tracing, init_tracing};
