// src/chain/node.rs

//! Node state machine.
//!
//! A node moves `Idle` -> `Running` -> `Finished` and never back. Every state
//! write happens while the owning chain's lock is held; the state itself is
//! kept in atomics so it can be read without the lock.
//!
//! The methods that mutate state take a `&ChainState` argument. Only code
//! holding the chain's mutex guard can produce one.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use tracing::{debug, trace};

use crate::chain::controller::{ChainShared, ChainState};
use crate::errors::{ChainError, Result};
use crate::exec::{ExecutionContext, JobId};
use crate::types::NodeState;

/// One step of a chain.
///
/// All callbacks run on the chain's execution context, never concurrently
/// with each other.
pub trait Node: Send + Sync + 'static {
    /// The step should start its work. When done (now or later, from any
    /// thread) it calls [`NodeHandle::advance`].
    ///
    /// A step that fails must still either advance or cancel the chain.
    fn on_run(&self, handle: NodeHandle);

    /// The chain was canceled while this step was running. Only delivered if
    /// `on_run` was delivered.
    fn on_cancel(&self) {}

    /// The step is done, either after advancing or right after `on_cancel`.
    /// Only delivered if `on_run` was delivered.
    fn on_finish(&self) {}

    /// Label used in logs and errors.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

pub(crate) struct NodeCore {
    node: Box<dyn Node>,
    state: AtomicU8,
    /// Whether the posted `on_run` actually fired. Nodes canceled before that
    /// point get no termination callbacks.
    has_run: AtomicBool,
    chain: OnceLock<Weak<ChainShared>>,
}

impl NodeCore {
    pub(crate) fn name(&self) -> &str {
        self.node.name()
    }

    pub(crate) fn state(&self) -> NodeState {
        NodeState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: NodeState, _locked: &ChainState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    pub(crate) fn has_run(&self) -> bool {
        self.has_run.load(Ordering::Acquire)
    }

    /// Bind this node to its chain. A node can be bound exactly once.
    pub(crate) fn bind(&self, chain: Weak<ChainShared>) -> Result<()> {
        self.chain
            .set(chain)
            .map_err(|_| ChainError::NodeAlreadyBound(self.name().to_string()))
    }

    /// Post `on_run` and move `Idle` -> `Running`.
    ///
    /// The posted job re-checks the state under the chain lock: if the node
    /// was canceled in between, `on_run` is skipped.
    pub(crate) fn notify_run(
        self: &Arc<Self>,
        chain: &Arc<ChainShared>,
        locked: &ChainState,
    ) -> Result<()> {
        let state = self.state();
        if state != NodeState::Idle {
            return Err(ChainError::IllegalNodeState(state));
        }
        // The job cannot observe the state before this lock is released, so
        // posting first leaves the node Idle if the context rejects it.
        let node = Arc::clone(self);
        let job_chain = Arc::clone(chain);
        chain.context().post(Box::new(move || {
            let run = {
                let _locked = job_chain.lock();
                let running = node.state() == NodeState::Running;
                if running {
                    node.has_run.store(true, Ordering::Release);
                }
                running
            };

            if run {
                trace!(node = %node.name(), "on_run");
                node.node.on_run(NodeHandle::new(&node));
            } else {
                debug!(node = %node.name(), "node canceled before on_run; skipping");
            }
        }))?;

        self.set_state(NodeState::Running, locked);
        debug!(chain = %chain.name(), node = %self.name(), "node running; on_run dispatched");
        Ok(())
    }

    /// Post `on_finish` for a node that is about to advance. Nothing is
    /// posted if `on_run` was never delivered.
    pub(crate) fn post_finish(
        self: &Arc<Self>,
        ctx: &dyn ExecutionContext,
    ) -> Result<Option<JobId>> {
        if !self.has_run() {
            return Ok(None);
        }

        let node = Arc::clone(self);
        let id = ctx.post(Box::new(move || {
            trace!(node = %node.name(), "on_finish");
            node.node.on_finish();
        }))?;
        Ok(Some(id))
    }

    /// `Running` -> `Finished` on the node's own request.
    pub(crate) fn complete(&self, locked: &ChainState) {
        self.set_state(NodeState::Finished, locked);
    }

    /// Any state but `Finished` -> `Finished`.
    ///
    /// Returns the callbacks still owed to the node: nodes that never
    /// executed `on_run` (or were already finished) get none.
    pub(crate) fn notify_cancel(self: &Arc<Self>, locked: &ChainState) -> Option<PendingCancel> {
        if self.state().is_terminal() {
            return None;
        }
        self.set_state(NodeState::Finished, locked);

        if !self.has_run() {
            debug!(node = %self.name(), "canceled before on_run; no callbacks");
            return None;
        }
        Some(PendingCancel {
            node: Arc::clone(self),
        })
    }
}

/// `on_cancel` + `on_finish` owed to a canceled node.
pub(crate) struct PendingCancel {
    node: Arc<NodeCore>,
}

impl PendingCancel {
    pub(crate) fn node_name(&self) -> &str {
        self.node.name()
    }

    /// Post both callbacks as a single job. `on_finish` is delivered even if
    /// `on_cancel` panics.
    pub(crate) fn dispatch(self, ctx: &dyn ExecutionContext) -> Result<()> {
        let node = self.node;
        ctx.post(Box::new(move || {
            let _finish = FinishGuard(node.node.as_ref());
            trace!(node = %node.name(), "on_cancel");
            node.node.on_cancel();
        }))?;
        Ok(())
    }
}

/// Delivers `on_finish` when dropped, including while unwinding.
struct FinishGuard<'a>(&'a dyn Node);

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        trace!(node = %self.0.name(), "on_finish");
        self.0.on_finish();
    }
}

/// A node as held by a chain.
///
/// Cloning yields another handle to the *same* node; identity is by
/// reference ([`ChainNode::ptr_eq`]).
#[derive(Clone)]
pub struct ChainNode {
    pub(crate) core: Arc<NodeCore>,
}

impl ChainNode {
    pub fn new<N: Node>(node: N) -> Self {
        Self {
            core: Arc::new(NodeCore {
                node: Box::new(node),
                state: AtomicU8::new(NodeState::Idle.as_u8()),
                has_run: AtomicBool::new(false),
                chain: OnceLock::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        self.core.name()
    }

    pub fn state(&self) -> NodeState {
        self.core.state()
    }

    /// Whether `on_run` has been delivered.
    pub fn has_run(&self) -> bool {
        self.core.has_run()
    }

    /// Whether the node has been added to a chain.
    pub fn is_bound(&self) -> bool {
        self.core.chain.get().is_some()
    }

    pub fn handle(&self) -> NodeHandle {
        NodeHandle::new(&self.core)
    }

    pub fn ptr_eq(&self, other: &ChainNode) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }
}

impl fmt::Debug for ChainNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainNode")
            .field("name", &self.name())
            .field("state", &self.state())
            .field("has_run", &self.has_run())
            .finish()
    }
}

/// Capability a running node uses to signal it is done.
///
/// Holds the node weakly, so a node may keep its own handle without leaking.
#[derive(Clone, Debug)]
pub struct NodeHandle {
    core: Weak<NodeCore>,
}

impl NodeHandle {
    fn new(core: &Arc<NodeCore>) -> Self {
        Self {
            core: Arc::downgrade(core),
        }
    }

    /// Finish this node and let the chain move on to the next one.
    ///
    /// - Not added to a chain: [`ChainError::NodeNotBound`].
    /// - Run not dispatched yet: [`ChainError::AdvanceBeforeRun`].
    /// - Already finished (advanced or canceled): no-op.
    pub fn advance(&self) -> Result<()> {
        let Some(core) = self.core.upgrade() else {
            debug!("advance() on a released node; ignoring");
            return Ok(());
        };

        let chain = core
            .chain
            .get()
            .ok_or_else(|| ChainError::NodeNotBound(core.name().to_string()))?;

        let Some(chain) = chain.upgrade() else {
            debug!(node = %core.name(), "advance() after its chain was dropped; ignoring");
            return Ok(());
        };

        chain.advance_from(&core)
    }

    /// State of the node, or `None` once every owner has dropped it.
    pub fn state(&self) -> Option<NodeState> {
        self.core.upgrade().map(|core| core.state())
    }
}
