// src/exec/mod.rs

//! Serialized execution layer.
//!
//! - [`context`] provides the `ExecutionContext` trait every chain posts its
//!   callbacks onto, along with the `Job` / `JobId` types.
//! - [`main_loop`] owns the production implementation: a single Tokio task
//!   that drains posted jobs in FIFO order and supports withdrawing jobs that
//!   have not started yet.

pub mod context;
pub mod main_loop;

pub use context::{ExecutionContext, Job, JobId};
pub use main_loop::MainLoop;
