// src/demo.rs

//! Concrete steps and listener used by the `taskchain` binary.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::chain::{Chain, ChainListener, ChainNode, Node, NodeHandle, WeakChain};
use crate::config::{ChainFile, StepConfig};

/// A step that counts `ticks` timer ticks on the Tokio runtime, then
/// advances. With zero ticks it advances straight from `on_run`.
pub struct TickerStep {
    name: String,
    ticks: u32,
    tick: Duration,
    cancel_chain: Option<WeakChain>,
    runtime: Handle,
    job: Mutex<Option<JoinHandle<()>>>,
}

impl TickerStep {
    /// Must be called from within a Tokio runtime.
    pub fn from_config(cfg: &StepConfig, chain: &Chain) -> Self {
        Self {
            name: cfg.name.clone(),
            ticks: cfg.ticks,
            tick: Duration::from_millis(cfg.tick_ms),
            cancel_chain: cfg.cancel_chain.then(|| chain.downgrade()),
            runtime: Handle::current(),
            job: Mutex::new(None),
        }
    }

    fn job(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.job.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Node for TickerStep {
    fn on_run(&self, handle: NodeHandle) {
        info!(step = %self.name, "on_run ----->");

        if let Some(chain) = self.cancel_chain.as_ref().and_then(WeakChain::upgrade) {
            info!(step = %self.name, "step cancels its chain");
            chain.cancel();
        }

        if self.ticks == 0 {
            if let Err(err) = handle.advance() {
                warn!(step = %self.name, error = %err, "advance failed");
            }
            return;
        }

        let name = self.name.clone();
        let ticks = self.ticks;
        let tick = self.tick;
        let job = self.runtime.spawn(async move {
            for n in 1..=ticks {
                tokio::time::sleep(tick).await;
                info!(step = %name, "count {n}");
            }
            if let Err(err) = handle.advance() {
                warn!(step = %name, error = %err, "advance failed");
            }
        });
        *self.job() = Some(job);
    }

    fn on_cancel(&self) {
        info!(step = %self.name, "on_cancel");
        if let Some(job) = self.job().take() {
            job.abort();
        }
    }

    fn on_finish(&self) {
        info!(step = %self.name, "on_finish");
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Build one node per configured step, in file order.
pub fn build_steps(cfg: &ChainFile, chain: &Chain) -> Vec<ChainNode> {
    cfg.steps
        .iter()
        .map(|step| ChainNode::new(TickerStep::from_config(step, chain)))
        .collect()
}

/// Listener that logs chain start/finish and lets a task await the finish.
#[derive(Debug, Default)]
pub struct FinishSignal {
    finished: Notify,
}

impl FinishSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve once the chain's `on_finish` has run.
    pub async fn wait(&self) {
        self.finished.notified().await;
    }
}

impl ChainListener for FinishSignal {
    fn on_start(&self) {
        info!("chain on_start");
    }

    fn on_finish(&self) {
        info!("chain on_finish");
        self.finished.notify_one();
    }
}
