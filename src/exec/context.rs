// src/exec/context.rs

//! Pluggable execution context abstraction.
//!
//! Every lifecycle callback a chain delivers (`on_run`, `on_cancel`,
//! `on_finish`, plus the chain listener hooks) is posted as a [`Job`] onto an
//! [`ExecutionContext`] instead of being called inline.
//!
//! - [`MainLoop`](super::MainLoop) is the implementation used by the
//!   `taskchain` binary. It runs jobs on a single Tokio task.
//! - Tests can provide their own context that queues jobs and runs them on
//!   demand (see the `taskchain-test-utils` crate).

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::errors::Result;

/// A unit of work posted to an execution context.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Identifier of a posted job, used to withdraw it before it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl JobId {
    /// Allocate a fresh, process-wide unique id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        JobId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Trait abstracting the serialized execution context.
///
/// Implementations must:
/// - run posted jobs one at a time, in submission order
/// - never run a job inline from within `post` (the chain posts while holding
///   its own lock)
/// - skip a job for which `withdraw` returned `true`
pub trait ExecutionContext: Send + Sync {
    /// Queue `job` behind everything posted before it.
    ///
    /// Returns [`ChainError::ContextClosed`](crate::errors::ChainError::ContextClosed)
    /// if the context no longer accepts work.
    fn post(&self, job: Job) -> Result<JobId>;

    /// Withdraw a job that has been posted but not started yet.
    ///
    /// Returns `true` if the job was still queued and will now never run.
    fn withdraw(&self, id: JobId) -> bool;
}
