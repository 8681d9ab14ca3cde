pub mod manual_context;
pub mod recording;

use std::sync::{Arc, Once};

use taskchain::chain::{Chain, ChainNode};
use tracing_subscriber::{fmt, EnvFilter};

pub use manual_context::ManualContext;
pub use recording::{EventLog, RecordingListener, RecordingNode};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
#[allow(dead_code)]
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// A chain on a fresh [`ManualContext`] with a [`RecordingListener`], plus
/// `count` auto-advancing [`RecordingNode`]s named `"0"`, `"1"`, ...
pub fn recording_chain(count: usize, log: &EventLog) -> (Arc<ManualContext>, Chain, Vec<ChainNode>) {
    let ctx = ManualContext::new();
    let chain = Chain::builder(ctx.clone())
        .name("test")
        .listener(Arc::new(RecordingListener::new(log)))
        .build();

    let nodes: Vec<ChainNode> = (0..count)
        .map(|i| ChainNode::new(RecordingNode::new(&i.to_string(), log)))
        .collect();
    for node in &nodes {
        chain.add(node).expect("add fresh node");
    }

    (ctx, chain, nodes)
}
