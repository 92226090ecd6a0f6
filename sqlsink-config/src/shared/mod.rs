//! Shared configuration types for the target.

mod base;
mod batch;
mod destination;
mod sink;
mod target;

pub use base::ValidationError;
pub use batch::BatchConfig;
pub use destination::{DestinationConfig, MssqlConnectionConfig};
pub use sink::SinkConfig;
pub use target::TargetConfig;
