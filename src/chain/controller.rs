// src/chain/controller.rs

//! Chain controller: ordering, start/cancel, and progression.
//!
//! All chain-owned state lives in one [`ChainState`] behind one mutex per
//! chain. Callbacks are never invoked while that mutex is held: everything a
//! node or listener observes is posted to the execution context. Moving on to
//! the next node is posted as well, so a node that advances from inside its
//! own `on_run` never re-enters the lock.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, error, info, warn};

use crate::chain::node::{ChainNode, NodeCore, PendingCancel};
use crate::errors::{ChainError, Result};
use crate::exec::{ExecutionContext, JobId};
use crate::types::NodeState;

/// Chain-level hooks, posted to the execution context.
pub trait ChainListener: Send + Sync + 'static {
    /// A `start()` call activated the chain. Runs before the first node's
    /// `on_run`.
    fn on_start(&self) {}

    /// The activation ended, either because the last node finished or because
    /// the chain was canceled. Fires at most once per activation.
    fn on_finish(&self) {}
}

#[derive(Default)]
pub(crate) struct ChainState {
    nodes: Vec<Arc<NodeCore>>,
    current_index: Option<usize>,
    current: Option<Arc<NodeCore>>,
    canceling: bool,
    finish_signaled: bool,
    /// Posted "move to next node" job, withdrawn on cancel.
    pending_step: Option<JobId>,
}

impl ChainState {
    fn is_current(&self, node: &Arc<NodeCore>) -> bool {
        self.current
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, node))
    }
}

pub(crate) struct ChainShared {
    name: String,
    ctx: Arc<dyn ExecutionContext>,
    listener: Option<Arc<dyn ChainListener>>,
    state: Mutex<ChainState>,
}

impl ChainShared {
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn context(&self) -> &dyn ExecutionContext {
        self.ctx.as_ref()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Entry point for [`NodeHandle::advance`](crate::chain::NodeHandle::advance).
    pub(crate) fn advance_from(self: &Arc<Self>, node: &Arc<NodeCore>) -> Result<()> {
        let mut state = self.lock();

        match node.state() {
            NodeState::Idle => Err(ChainError::AdvanceBeforeRun(node.name().to_string())),
            NodeState::Finished => {
                debug!(
                    chain = %self.name,
                    node = %node.name(),
                    "advance() on a finished node; ignoring"
                );
                Ok(())
            }
            NodeState::Running => {
                if !state.is_current(node) {
                    return Err(ChainError::NotActiveNode(node.name().to_string()));
                }

                // Both jobs are posted before the node finishes: if either
                // is rejected the node stays Running and can advance again.
                let on_finish = node.post_finish(self.context())?;
                let chain = Arc::clone(self);
                let finished = Arc::clone(node);
                let step = match self.ctx.post(Box::new(move || chain.run_next(&finished))) {
                    Ok(id) => id,
                    Err(err) => {
                        if let Some(id) = on_finish {
                            self.ctx.withdraw(id);
                        }
                        return Err(err);
                    }
                };

                node.complete(&state);
                state.pending_step = Some(step);
                debug!(
                    chain = %self.name,
                    node = %node.name(),
                    index = ?state.current_index,
                    "node advanced"
                );
                Ok(())
            }
        }
    }

    fn run_next(self: &Arc<Self>, finished: &Arc<NodeCore>) {
        let mut state = self.lock();
        state.pending_step = None;

        if let Err(err) = self.progress(&mut state, finished) {
            error!(
                chain = %self.name,
                node = %finished.name(),
                error = %err,
                "chain progression aborted"
            );
        }
    }

    fn progress(self: &Arc<Self>, state: &mut ChainState, finished: &Arc<NodeCore>) -> Result<()> {
        let Some(current) = state.current.as_ref() else {
            debug!(chain = %self.name, "chain no longer active; dropping progression");
            return Ok(());
        };
        if !Arc::ptr_eq(current, finished) {
            return Err(ChainError::NotActiveNode(finished.name().to_string()));
        }
        let finished_state = finished.state();
        if finished_state != NodeState::Finished {
            return Err(ChainError::NodeNotFinished(finished_state));
        }

        let next_index = state.current_index.map_or(0, |i| i + 1);
        let Some(next) = state.nodes.get(next_index).cloned() else {
            info!(chain = %self.name, nodes = state.nodes.len(), "chain finished");
            self.reset(state);
            if self.claim_finish(state) {
                self.dispatch_finish();
            }
            return Ok(());
        };

        debug!(chain = %self.name, node = %next.name(), index = next_index, "moving to next node");
        let previous = (state.current_index, state.current.clone());
        state.current_index = Some(next_index);
        state.current = Some(Arc::clone(&next));
        if let Err(err) = next.notify_run(self, state) {
            // The next node stays Idle; cancel() still clears the chain.
            (state.current_index, state.current) = previous;
            return Err(err);
        }
        Ok(())
    }

    fn reset(&self, state: &mut ChainState) {
        state.nodes.clear();
        state.current_index = None;
        state.current = None;
    }

    /// Claim the once-per-activation finish signal.
    fn claim_finish(&self, state: &mut ChainState) -> bool {
        !std::mem::replace(&mut state.finish_signaled, true)
    }

    fn dispatch_finish(&self) {
        let Some(listener) = self.listener.clone() else {
            return;
        };
        if let Err(err) = self.ctx.post(Box::new(move || listener.on_finish())) {
            warn!(chain = %self.name, error = %err, "could not dispatch chain on_finish");
        }
    }
}

/// An ordered list of nodes run one at a time.
///
/// Cloning yields another handle to the same chain. The API can be called
/// from any thread, including from inside node callbacks.
#[derive(Clone)]
pub struct Chain {
    shared: Arc<ChainShared>,
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("Chain")
            .field("name", &self.shared.name)
            .field("size", &state.nodes.len())
            .field("current_index", &state.current_index)
            .field("canceling", &state.canceling)
            .finish_non_exhaustive()
    }
}

impl Chain {
    pub fn new(ctx: Arc<dyn ExecutionContext>) -> Self {
        ChainBuilder::new(ctx).build()
    }

    pub fn builder(ctx: Arc<dyn ExecutionContext>) -> ChainBuilder {
        ChainBuilder::new(ctx)
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// A handle that does not keep the chain alive. Useful for nodes that
    /// need to cancel their own chain.
    pub fn downgrade(&self) -> WeakChain {
        WeakChain {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Number of nodes currently in the chain.
    pub fn size(&self) -> usize {
        self.shared.lock().nodes.len()
    }

    /// Whether an activation is in progress (a node is active).
    pub fn is_started(&self) -> bool {
        self.shared.lock().current.is_some()
    }

    /// Append a node. A node can belong to one chain only, once.
    ///
    /// Nodes may be appended while earlier nodes run.
    pub fn add(&self, node: &ChainNode) -> Result<()> {
        let mut state = self.shared.lock();
        if state.canceling {
            return Err(ChainError::AddWhileCanceling(node.name().to_string()));
        }

        node.core.bind(Arc::downgrade(&self.shared))?;
        state.nodes.push(Arc::clone(&node.core));
        debug!(
            chain = %self.shared.name,
            node = %node.name(),
            index = state.nodes.len() - 1,
            "node added"
        );
        Ok(())
    }

    /// Dispatch the first node.
    ///
    /// Returns `Ok(true)` if this call activated the chain, `Ok(false)` if
    /// the chain is empty or already active.
    pub fn start(&self) -> Result<bool> {
        let shared = &self.shared;
        let mut state = shared.lock();

        if state.nodes.is_empty() {
            debug!(chain = %shared.name, "start() on empty chain; ignoring");
            return Ok(false);
        }
        if state.current.is_some() {
            debug!(chain = %shared.name, "start() on active chain; ignoring");
            return Ok(false);
        }

        let head = Arc::clone(&state.nodes[0]);
        let head_state = head.state();
        if head_state != NodeState::Idle {
            return Err(ChainError::IllegalNodeState(head_state));
        }

        let on_start = match shared.listener.clone() {
            Some(listener) => Some(shared.ctx.post(Box::new(move || listener.on_start()))?),
            None => None,
        };

        state.finish_signaled = false;
        state.current_index = Some(0);
        state.current = Some(Arc::clone(&head));
        if let Err(err) = head.notify_run(shared, &state) {
            if let Some(id) = on_start {
                shared.ctx.withdraw(id);
            }
            state.current_index = None;
            state.current = None;
            return Err(err);
        }

        info!(chain = %shared.name, nodes = state.nodes.len(), "chain started");
        Ok(true)
    }

    /// Cancel every node and clear the chain.
    ///
    /// Bookkeeping is done before this returns; `on_cancel` / `on_finish`
    /// are delivered later on the execution context, and only to a node whose
    /// `on_run` was delivered. Calling it again, or while a cancel is being
    /// dispatched, does nothing.
    pub fn cancel(&self) {
        let shared = &self.shared;

        // State transitions happen under the lock. The callbacks they owe are
        // posted after releasing it, while `canceling` still rejects `add`.
        let (nodes, owed, finish) = {
            let mut state = shared.lock();
            if state.canceling {
                debug!(chain = %shared.name, "cancel already in progress; ignoring");
                return;
            }
            state.canceling = true;

            if let Some(id) = state.pending_step.take() {
                let withdrawn = shared.ctx.withdraw(id);
                debug!(chain = %shared.name, %id, withdrawn, "withdrew pending progression");
            }

            let was_active = state.current.is_some();
            let nodes = std::mem::take(&mut state.nodes);
            let owed: Vec<PendingCancel> = nodes
                .iter()
                .filter_map(|node| node.notify_cancel(&state))
                .collect();
            shared.reset(&mut state);

            let finish = was_active && shared.claim_finish(&mut state);
            (nodes, owed, finish)
        };

        for pending in owed {
            let node = pending.node_name().to_string();
            if let Err(err) = pending.dispatch(shared.context()) {
                warn!(
                    chain = %shared.name,
                    node = %node,
                    error = %err,
                    "could not dispatch cancellation"
                );
            }
        }
        if finish {
            info!(chain = %shared.name, nodes = nodes.len(), "chain canceled");
            shared.dispatch_finish();
        } else if !nodes.is_empty() {
            debug!(chain = %shared.name, nodes = nodes.len(), "cleared idle chain");
        }

        shared.lock().canceling = false;
    }
}

/// Non-owning reference to a [`Chain`].
#[derive(Clone, Debug)]
pub struct WeakChain {
    shared: Weak<ChainShared>,
}

impl WeakChain {
    pub fn upgrade(&self) -> Option<Chain> {
        self.shared.upgrade().map(|shared| Chain { shared })
    }
}

/// Builder for [`Chain`].
pub struct ChainBuilder {
    ctx: Arc<dyn ExecutionContext>,
    name: String,
    listener: Option<Arc<dyn ChainListener>>,
}

impl ChainBuilder {
    pub fn new(ctx: Arc<dyn ExecutionContext>) -> Self {
        Self {
            ctx,
            name: "chain".to_string(),
            listener: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn listener(mut self, listener: Arc<dyn ChainListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn build(self) -> Chain {
        Chain {
            shared: Arc::new(ChainShared {
                name: self.name,
                ctx: self.ctx,
                listener: self.listener,
                state: Mutex::new(ChainState::default()),
            }),
        }
    }
}
