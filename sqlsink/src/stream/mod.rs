//! Line-delimited record-stream messages.

mod message;
mod reader;

pub use message::*;
pub use reader::MessageReader;
