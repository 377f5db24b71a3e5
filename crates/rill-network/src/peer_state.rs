//! Per-peer synchronization state.

use std::net::SocketAddr;

use rill_core::types::Hash256;

/// A single outstanding block request against one peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedBlock {
    pub hash: Hash256,
    /// Reference to the block's entry in the chain index. Absent when this
    /// request was issued before the block's headers were validated.
    pub index: Option<Hash256>,
    pub queued_at: u64,
    /// Snapshot of `queued_validated_headers` at the moment this entry was
    /// inserted, kept for stall-duration diagnostics by callers.
    pub queued_validated_headers_at_insert: u64,
    pub has_validated_headers: bool,
}

impl QueuedBlock {
    pub(crate) fn new(hash: Hash256, index: Option<Hash256>, queued_at: u64, queued_validated_headers_at_insert: u64) -> Self {
        Self {
            hash,
            index,
            queued_at,
            queued_validated_headers_at_insert,
            has_validated_headers: index.is_some(),
        }
    }
}

/// Connection-time identity supplied to [`crate::registry::PeerRegistry::initialize`].
#[derive(Debug, Clone)]
pub struct ConnectInfo {
    pub name: String,
    pub address: SocketAddr,
    pub outbound: bool,
    pub whitelisted: bool,
    pub one_shot: bool,
    pub light_client: bool,
}

/// Inputs to [`crate::registry::PeerRegistry::update_preferred_download`] —
/// whatever subset of connection properties can flip `preferred_download`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionFlags {
    pub outbound: bool,
    pub whitelisted: bool,
    pub one_shot: bool,
    pub light_client: bool,
}

/// Per-connection synchronization record.
#[derive(Debug, Clone)]
pub struct PeerState {
    pub name: String,
    pub address: SocketAddr,

    pub misbehavior_score: u32,
    pub sync_started: bool,
    pub currently_connected: bool,
    pub preferred_download: bool,

    pub outbound: bool,
    pub whitelisted: bool,
    pub one_shot: bool,
    pub light_client: bool,

    pub blocks_in_flight: Vec<QueuedBlock>,
    /// `0` means not stalling.
    pub stalling_since: u64,

    pub best_known_block: Option<Hash256>,
    pub last_common_block: Option<Hash256>,
    /// `Hash256::ZERO` means no pending unknown announcement.
    pub last_unknown_block: Hash256,

    pub scanning_error_count: u64,
    pub last_scanning_error_height: i64,
}

impl PeerState {
    pub(crate) fn new(info: &ConnectInfo) -> Self {
        Self {
            name: info.name.clone(),
            address: info.address,
            misbehavior_score: 0,
            sync_started: false,
            currently_connected: true,
            preferred_download: false,
            outbound: info.outbound,
            whitelisted: info.whitelisted,
            one_shot: info.one_shot,
            light_client: info.light_client,
            blocks_in_flight: Vec::new(),
            stalling_since: 0,
            best_known_block: None,
            last_common_block: None,
            last_unknown_block: Hash256::ZERO,
            scanning_error_count: 0,
            last_scanning_error_height: -1,
        }
    }

    pub fn blocks_in_flight_count(&self) -> usize {
        self.blocks_in_flight.len()
    }

    /// Recomputes `preferred_download` per §4.1: `(outbound OR whitelisted)
    /// AND NOT one_shot AND NOT light_client`.
    pub(crate) fn recompute_preferred_download(&self) -> bool {
        (self.outbound || self.whitelisted) && !self.one_shot && !self.light_client
    }

    pub fn add_misbehavior(&mut self, amount: u32) {
        self.misbehavior_score = self.misbehavior_score.saturating_add(amount);
    }
}
