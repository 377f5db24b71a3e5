//! Error types for the Rill protocol.
use thiserror::Error;

/// Conditions an embedding node may want to log rather than crash on.
///
/// Most of this crate's failure modes are *not* exceptions: a caller that
/// violates the "known peer id, lock already held" contract gets a `panic!`
/// (see `rill-network::registry`), and the planner's own failure mode is an
/// empty result, not an error. `SchedulerError` exists for the handful of
/// genuinely recoverable conditions: bad configuration, and propagation from
/// the `AddressBook`/`OrphanPool` collaborator traits.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("collaborator failure: {0}")]
    Collaborator(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainIndexError {
    #[error("block not found: {0}")]
    BlockNotFound(String),
    #[error("block is not on any known chain: {0}")]
    Disconnected(String),
}

#[derive(Error, Debug)]
pub enum RillError {
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error(transparent)]
    ChainIndex(#[from] ChainIndexError),
}
