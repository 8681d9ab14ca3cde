use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use taskchain::errors::{ChainError, Result};
use taskchain::exec::{ExecutionContext, Job, JobId};

/// Upper bound on jobs drained by one `run_until_idle` call. A chain that
/// keeps posting past this is treated as a runaway loop.
const MAX_JOBS_PER_DRAIN: usize = 10_000;

/// A deterministic execution context:
/// - `post` only queues
/// - nothing runs until the test calls `run_next` / `run_until_idle`
/// - jobs run on the calling thread, FIFO
#[derive(Default)]
pub struct ManualContext {
    queue: Mutex<VecDeque<(JobId, Job)>>,
    closed: AtomicBool,
}

impl ManualContext {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of queued jobs.
    pub fn pending(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    /// Run the oldest queued job. Returns false if the queue was empty.
    pub fn run_next(&self) -> bool {
        // Pop under the lock, run outside it: jobs post more jobs.
        let next = self.queue.lock().unwrap().pop_front();
        match next {
            Some((_id, job)) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Run jobs until the queue is empty, including jobs posted by the jobs
    /// themselves. Returns how many ran.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while self.run_next() {
            ran += 1;
            assert!(
                ran < MAX_JOBS_PER_DRAIN,
                "ManualContext: more than {MAX_JOBS_PER_DRAIN} jobs in one drain"
            );
        }
        ran
    }

    /// Reject all further posts.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Accept posts again after [`close`](Self::close).
    pub fn reopen(&self) {
        self.closed.store(false, Ordering::SeqCst);
    }
}

impl ExecutionContext for ManualContext {
    fn post(&self, job: Job) -> Result<JobId> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ChainError::ContextClosed);
        }
        let id = JobId::next();
        self.queue.lock().unwrap().push_back((id, job));
        Ok(id)
    }

    fn withdraw(&self, id: JobId) -> bool {
        let mut queue = self.queue.lock().unwrap();
        match queue.iter().position(|(queued, _)| *queued == id) {
            Some(pos) => {
                queue.remove(pos);
                true
            }
            None => false,
        }
    }
}
