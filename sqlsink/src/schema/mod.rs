//! Schema resolution: mapping property descriptors to column types, merging column types, and
//! building the destination table shape of a stream.

mod mapper;
mod merge;
mod table;

pub use mapper::{KEY_VARCHAR_LENGTH, MAX_BOUNDED_VARCHAR_LENGTH, TypeMapper};
pub use merge::{merge_pair, merge_types};
pub use table::StreamTable;
