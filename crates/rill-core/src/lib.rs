//! # rill-core
//! Foundation types for the peer block-download scheduler: hashes, peer
//! identity, chain-work ordering, and the block index abstraction the
//! scheduler plans against.

pub mod chain_index;
pub mod constants;
pub mod error;
pub mod types;
