// src/chain/mod.rs

//! Sequential task chain.
//!
//! A [`Chain`] owns an ordered list of [`ChainNode`]s and runs them one at a
//! time. Each node explicitly signals completion through its
//! [`NodeHandle`] before the next one is dispatched, and the whole chain can
//! be canceled mid-flight.
//!
//! - [`node`] holds the per-node state machine and the [`Node`] trait that
//!   concrete steps implement.
//! - [`controller`] holds the chain itself: ordering, `start` / `cancel`
//!   semantics and dispatch onto the execution context.
//!
//! For a chain whose nodes advance immediately, the callback order on the
//! execution context is:
//!
//! ```text
//! listener.on_start
//! node0.on_run, node0.on_finish
//! node1.on_run, node1.on_finish
//! ...
//! listener.on_finish
//! ```

pub mod controller;
pub mod node;

pub use controller::{Chain, ChainBuilder, ChainListener, WeakChain};
pub use node::{ChainNode, Node, NodeHandle};
