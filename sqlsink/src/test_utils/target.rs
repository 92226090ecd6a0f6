use serde_json::Value;
use sqlsink_config::shared::{BatchConfig, SinkConfig};

use crate::error::SinkResult;
use crate::session::memory::MemorySession;
use crate::target::{Target, TargetSummary};

/// Outcome of a record stream run against a [`MemorySession`].
#[derive(Debug)]
pub struct TestRun {
    pub result: SinkResult<TargetSummary>,
    /// Values of the state messages written to the output, in order.
    pub states: Vec<Value>,
}

/// Creates a target over a fresh [`MemorySession`] with default batching.
pub fn memory_target(config: SinkConfig) -> Target<MemorySession> {
    Target::new(MemorySession::new(), config, BatchConfig::default())
}

/// Feeds `lines` to `target` and collects the state messages it writes.
pub async fn run_lines(target: &mut Target<MemorySession>, lines: &[String]) -> TestRun {
    let input = lines.join("\n");
    let mut output = Vec::new();
    let result = target.run(input.as_bytes(), &mut output).await;

    let states = String::from_utf8_lossy(&output)
        .lines()
        .map(|line| {
            let message: Value =
                serde_json::from_str(line).expect("target wrote an invalid state line");
            message["value"].clone()
        })
        .collect();

    TestRun { result, states }
}
