// src/lib.rs

pub mod chain;
pub mod cli;
pub mod config;
pub mod demo;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod types;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::{debug, info};

use crate::chain::Chain;
use crate::cli::CliArgs;
use crate::config::{ChainFile, default_config_path, load_and_validate};
use crate::demo::{FinishSignal, build_steps};
use crate::exec::MainLoop;

pub use crate::chain::{ChainBuilder, ChainListener, ChainNode, Node, NodeHandle, WeakChain};
pub use crate::errors::ChainError;
pub use crate::exec::{ExecutionContext, Job, JobId};
pub use crate::types::NodeState;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - chain file loading (or the built-in demo)
/// - the main loop every callback is posted to
/// - the chain and its steps
/// - Ctrl-C and the optional cancel timer, both of which cancel the chain
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = resolve_chain_file(args.config.as_deref())?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let main_loop = MainLoop::spawn();
    let finished = Arc::new(FinishSignal::new());

    let chain = Chain::builder(Arc::new(main_loop.clone()))
        .name(cfg.chain.name.clone())
        .listener(finished.clone())
        .build();

    for node in build_steps(&cfg, &chain) {
        chain.add(&node)?;
    }

    if !chain.start()? {
        bail!("chain '{}' did not start", cfg.chain.name);
    }

    let cancel_after = args
        .cancel_after_ms
        .or(cfg.chain.cancel_after_ms)
        .map(Duration::from_millis);

    tokio::select! {
        _ = finished.wait() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received; canceling chain");
            chain.cancel();
            finished.wait().await;
        }
        _ = cancel_timer(cancel_after) => {
            info!(?cancel_after, "cancel timer elapsed; canceling chain");
            chain.cancel();
            finished.wait().await;
        }
    }

    main_loop.wait_idle().await;
    main_loop.shutdown();
    info!("taskchain exiting");
    Ok(())
}

/// Pick the chain file:
/// - an explicit `--config` path must exist and validate
/// - otherwise `Taskchain.toml` is used if present
/// - otherwise the built-in demo chain
fn resolve_chain_file(explicit: Option<&str>) -> Result<ChainFile> {
    if let Some(path) = explicit {
        return load_and_validate(path)
            .with_context(|| format!("loading chain file {path}"));
    }

    let default_path = default_config_path();
    if Path::new(&default_path).exists() {
        return load_and_validate(&default_path)
            .with_context(|| format!("loading chain file {}", default_path.display()));
    }

    debug!("no chain file found; using built-in demo chain");
    Ok(ChainFile::builtin_demo())
}

async fn cancel_timer(after: Option<Duration>) {
    match after {
        Some(delay) => tokio::time::sleep(delay).await,
        None => std::future::pending::<()>().await,
    }
}

/// Simple dry-run output: print the chain and its steps.
fn print_dry_run(cfg: &ChainFile) {
    println!("taskchain dry-run");
    println!("  chain.name = {}", cfg.chain.name);
    if let Some(ms) = cfg.chain.cancel_after_ms {
        println!("  chain.cancel_after_ms = {ms}");
    }
    println!();

    println!("steps ({}):", cfg.steps.len());
    for (index, step) in cfg.steps.iter().enumerate() {
        println!("  {index}. {}", step.name);
        if step.ticks > 0 {
            println!("      ticks: {} x {}ms", step.ticks, step.tick_ms);
        }
        if step.cancel_chain {
            println!("      cancel_chain: true");
        }
    }

    debug!("dry-run complete (no execution)");
}
