#![allow(dead_code)]

pub use taskchain_test_utils::{
    EventLog, ManualContext, RecordingListener, RecordingNode, init_tracing, recording_chain,
    with_timeout,
};

/// Build an owned event list from string literals.
pub fn events(expected: &[&str]) -> Vec<String> {
    expected.iter().map(|e| e.to_string()).collect()
}
