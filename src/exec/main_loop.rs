// src/exec/main_loop.rs

//! Tokio-backed main loop: a single consumer draining posted jobs in FIFO
//! order.

use std::collections::HashSet;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{mpsc, Notify};
use tracing::{debug, error, info, trace, warn};

use crate::errors::{ChainError, Result};
use crate::exec::context::{ExecutionContext, Job, JobId};

enum Message {
    Run(JobId, Job),
    Shutdown,
}

struct Shared {
    tx: mpsc::UnboundedSender<Message>,
    /// Jobs posted but not started. Withdrawing removes the id from here; the
    /// loop skips anything it can't find.
    queued: Mutex<HashSet<JobId>>,
    /// Jobs posted and not yet run or skipped by the loop.
    outstanding: AtomicUsize,
    closed: AtomicBool,
    idle: Notify,
}

impl Shared {
    fn queued(&self) -> std::sync::MutexGuard<'_, HashSet<JobId>> {
        self.queued.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn settle_one(&self) {
        if self.outstanding.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic payload>")
}

/// Handle to a running main loop.
///
/// Cloning is cheap; all clones post onto the same loop. Posted jobs run one
/// at a time on a single Tokio task, in submission order. A job that panics
/// is logged and the loop moves on to the next one.
#[derive(Clone)]
pub struct MainLoop {
    shared: Arc<Shared>,
}

impl fmt::Debug for MainLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MainLoop")
            .field("outstanding", &self.outstanding())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl MainLoop {
    /// Spawn the loop task on the current Tokio runtime.
    ///
    /// Must be called from within a runtime.
    pub fn spawn() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        let shared = Arc::new(Shared {
            tx,
            queued: Mutex::new(HashSet::new()),
            outstanding: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            idle: Notify::new(),
        });

        let loop_shared = Arc::clone(&shared);
        tokio::spawn(async move {
            info!("main loop started");

            while let Some(message) = rx.recv().await {
                match message {
                    Message::Run(id, job) => {
                        let runnable = loop_shared.queued().remove(&id);
                        if runnable {
                            trace!(%id, "running job");
                            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
                                error!(%id, panic = %panic_message(&*payload), "job panicked");
                            }
                        } else {
                            debug!(%id, "skipping withdrawn job");
                        }
                        loop_shared.settle_one();
                    }
                    Message::Shutdown => break,
                }
            }

            // Anything still queued behind the shutdown marker is dropped.
            let dropped = {
                let mut queued = loop_shared.queued();
                let n = queued.len();
                queued.clear();
                n
            };
            if dropped > 0 {
                warn!(dropped, "main loop stopped with jobs still queued");
            }
            loop_shared.outstanding.store(0, Ordering::Release);
            loop_shared.idle.notify_waiters();

            info!("main loop finished");
        });

        Self { shared }
    }

    /// Number of jobs posted and not yet run or skipped.
    pub fn outstanding(&self) -> usize {
        self.shared.outstanding.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Wait until every posted job (including jobs posted by other jobs while
    /// waiting) has run or been skipped.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            if self.outstanding() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Stop accepting work. Jobs posted before this call still run; the loop
    /// task exits once it reaches the shutdown marker.
    pub fn shutdown(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if self.shared.tx.send(Message::Shutdown).is_err() {
            debug!("main loop already gone at shutdown");
        }
    }
}

impl ExecutionContext for MainLoop {
    fn post(&self, job: Job) -> Result<JobId> {
        if self.is_closed() {
            return Err(ChainError::ContextClosed);
        }

        let id = JobId::next();
        self.shared.queued().insert(id);
        self.shared.outstanding.fetch_add(1, Ordering::AcqRel);

        if self.shared.tx.send(Message::Run(id, job)).is_err() {
            self.shared.queued().remove(&id);
            self.shared.settle_one();
            return Err(ChainError::ContextClosed);
        }

        Ok(id)
    }

    fn withdraw(&self, id: JobId) -> bool {
        let withdrawn = self.shared.queued().remove(&id);
        if withdrawn {
            debug!(%id, "withdrew queued job");
        }
        withdrawn
    }
}
