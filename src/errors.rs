// src/errors.rs

//! Crate-wide error aliases and helpers.
//!
//! Usage mistakes (adding a node twice, advancing a node that never ran, ...)
//! are reported through [`ChainError`] at the call site that detected them.
//! Normal progression and cancellation never produce an error.

use thiserror::Error;

use crate::types::NodeState;

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("node '{0}' has already been added to a chain")]
    NodeAlreadyBound(String),

    #[error("cannot add node '{0}' while the chain is canceling")]
    AddWhileCanceling(String),

    #[error("illegal node state {0:?} (node reused?)")]
    IllegalNodeState(NodeState),

    #[error("node '{0}' has not been added to any chain")]
    NodeNotBound(String),

    #[error("node '{0}' cannot advance before on_run()")]
    AdvanceBeforeRun(String),

    #[error("node '{0}' is not the active node of its chain")]
    NotActiveNode(String),

    #[error("active node has not finished (state {0:?})")]
    NodeNotFinished(NodeState),

    #[error("execution context is closed")]
    ContextClosed,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ChainError>;
