// tests/main_loop_runtime.rs

mod common;
use crate::common::{EventLog, RecordingListener, RecordingNode};
use crate::common::{events, init_tracing, with_timeout};

use std::sync::Arc;
use std::time::Duration;

use taskchain::chain::{Chain, ChainNode};
use taskchain::config::{ChainFile, ChainSection, RawChainFile, StepConfig};
use taskchain::demo::{FinishSignal, build_steps};
use taskchain::exec::{ExecutionContext, MainLoop};
use taskchain::types::NodeState;

fn chain_file(steps: Vec<StepConfig>) -> ChainFile {
    ChainFile::try_from(RawChainFile {
        chain: ChainSection::default(),
        steps,
    })
    .unwrap()
}

#[tokio::test]
async fn recording_chain_runs_to_completion_on_the_main_loop() {
    init_tracing();

    let main_loop = MainLoop::spawn();
    let log = EventLog::new();
    let chain = Chain::builder(Arc::new(main_loop.clone()))
        .name("runtime")
        .listener(Arc::new(RecordingListener::new(&log)))
        .build();

    for prefix in ["a", "b", "c"] {
        chain.add(&ChainNode::new(RecordingNode::new(prefix, &log))).unwrap();
    }
    assert!(chain.start().unwrap());

    with_timeout(main_loop.wait_idle()).await;

    assert_eq!(
        log.events(),
        events(&[
            "chain.start",
            "a.run", "a.finish",
            "b.run", "b.finish",
            "c.run", "c.finish",
            "chain.finish",
        ])
    );
    assert!(!chain.is_started());
    main_loop.shutdown();
}

#[tokio::test]
async fn ticker_steps_finish_in_order() {
    init_tracing();

    let main_loop = MainLoop::spawn();
    let finished = Arc::new(FinishSignal::new());
    let chain = Chain::builder(Arc::new(main_loop.clone()))
        .listener(finished.clone())
        .build();

    let cfg = chain_file(vec![
        StepConfig::new("instant"),
        StepConfig::new("ticking").with_ticks(3, 5),
        StepConfig::new("last"),
    ]);
    let nodes = build_steps(&cfg, &chain);
    for node in &nodes {
        chain.add(node).unwrap();
    }
    chain.start().unwrap();

    with_timeout(finished.wait()).await;
    with_timeout(main_loop.wait_idle()).await;

    for node in &nodes {
        assert_eq!(node.state(), NodeState::Finished);
        assert!(node.has_run());
    }
    main_loop.shutdown();
}

#[tokio::test]
async fn cancel_during_a_ticking_step_skips_the_rest() {
    init_tracing();

    let main_loop = MainLoop::spawn();
    let finished = Arc::new(FinishSignal::new());
    let chain = Chain::builder(Arc::new(main_loop.clone()))
        .listener(finished.clone())
        .build();

    let cfg = chain_file(vec![
        StepConfig::new("first"),
        StepConfig::new("slow").with_ticks(1000, 10),
        StepConfig::new("never"),
    ]);
    let nodes = build_steps(&cfg, &chain);
    for node in &nodes {
        chain.add(node).unwrap();
    }
    chain.start().unwrap();

    // Wait for the slow step to be dispatched.
    with_timeout(async {
        while !nodes[1].has_run() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await;

    chain.cancel();
    with_timeout(finished.wait()).await;
    with_timeout(main_loop.wait_idle()).await;

    assert_eq!(nodes[1].state(), NodeState::Finished);
    assert_eq!(nodes[2].state(), NodeState::Finished);
    assert!(!nodes[2].has_run());
    assert_eq!(chain.size(), 0);
    main_loop.shutdown();
}

#[tokio::test]
async fn step_that_cancels_its_chain_ends_the_activation() {
    init_tracing();

    let main_loop = MainLoop::spawn();
    let finished = Arc::new(FinishSignal::new());
    let chain = Chain::builder(Arc::new(main_loop.clone()))
        .listener(finished.clone())
        .build();

    let mut canceler = StepConfig::new("canceler");
    canceler.cancel_chain = true;
    let cfg = chain_file(vec![StepConfig::new("first"), canceler, StepConfig::new("after")]);
    let nodes = build_steps(&cfg, &chain);
    for node in &nodes {
        chain.add(node).unwrap();
    }
    chain.start().unwrap();

    with_timeout(finished.wait()).await;
    with_timeout(main_loop.wait_idle()).await;

    assert!(nodes[0].has_run());
    assert!(nodes[1].has_run());
    assert!(!nodes[2].has_run());
    main_loop.shutdown();
}

#[tokio::test]
async fn panicking_on_cancel_still_finishes_the_chain() {
    init_tracing();

    let main_loop = MainLoop::spawn();
    let log = EventLog::new();
    let chain = Chain::builder(Arc::new(main_loop.clone()))
        .listener(Arc::new(RecordingListener::new(&log)))
        .build();

    let node = ChainNode::new(
        RecordingNode::new("0", &log)
            .manual()
            .on_cancel(|| panic!("on_cancel blew up")),
    );
    chain.add(&node).unwrap();
    chain.start().unwrap();
    with_timeout(main_loop.wait_idle()).await;

    chain.cancel();
    with_timeout(main_loop.wait_idle()).await;

    assert_eq!(
        log.events(),
        events(&["chain.start", "0.run", "0.cancel", "0.finish", "chain.finish"])
    );
    assert_eq!(main_loop.outstanding(), 0);

    // The loop keeps serving other chains.
    log.clear();
    let next = Chain::new(Arc::new(main_loop.clone()));
    next.add(&ChainNode::new(RecordingNode::new("after", &log))).unwrap();
    assert!(next.start().unwrap());
    with_timeout(main_loop.wait_idle()).await;

    assert_eq!(log.events(), events(&["after.run", "after.finish"]));
    main_loop.shutdown();
}

#[tokio::test]
async fn shutdown_rejects_new_chains() {
    init_tracing();

    let main_loop = MainLoop::spawn();
    main_loop.shutdown();
    assert!(main_loop.is_closed());

    let log = EventLog::new();
    let chain = Chain::new(Arc::new(main_loop.clone()));
    chain.add(&ChainNode::new(RecordingNode::new("0", &log))).unwrap();

    assert!(chain.start().is_err());
    assert!(main_loop.post(Box::new(|| {})).is_err());
}
