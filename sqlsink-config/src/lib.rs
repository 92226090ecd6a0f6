//! Configuration types and loading for the SQL sink.
//!
//! Configuration is read from a YAML or JSON file and can be overridden through `APP_`-prefixed
//! environment variables.

mod load;
pub mod shared;

pub use load::{Config, LoadConfigError, load_config, load_config_from};
