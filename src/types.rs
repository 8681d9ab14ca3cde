/// Lifecycle state of a node.
///
/// Transitions are monotonic: `Idle` -> `Running` -> `Finished`.
/// `Finished` is terminal.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeState {
    /// Created or added, not yet dispatched.
    #[default]
    Idle,
    /// Run has been dispatched (or already executed) and the node has not
    /// advanced or been canceled yet.
    Running,
    /// Advanced or canceled.
    Finished,
}

impl NodeState {
    pub(crate) fn as_u8(self) -> u8 {
        match self {
            NodeState::Idle => 0,
            NodeState::Running => 1,
            NodeState::Finished => 2,
        }
    }

    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            0 => NodeState::Idle,
            1 => NodeState::Running,
            _ => NodeState::Finished,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, NodeState::Finished)
    }
}
