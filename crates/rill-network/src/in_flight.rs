//! Global mapping from block hash to the peer it was requested from.
//!
//! Bitcoin/Divi store `(NodeId, std::list<QueuedBlock>::iterator)` so that a
//! block arriving erases its queue entry in O(1). Rust's `Vec` has no
//! iterator that survives arbitrary insertion/removal elsewhere in the
//! `Vec`, so this registry keeps only the owning peer and relies on a linear
//! scan of that peer's (window-bounded, therefore small) in-flight list to
//! find the exact entry — the fallback the design notes call out as
//! acceptable.

use std::collections::HashMap;

use rill_core::types::{Hash256, PeerId};

use crate::peer_state::PeerState;

#[derive(Debug, Default)]
pub struct InFlightRegistry {
    owners: HashMap<Hash256, PeerId>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_in_flight(&self, hash: &Hash256) -> bool {
        self.owners.contains_key(hash)
    }

    /// Peer currently responsible for `hash`. Panics if `hash` is not in
    /// flight — callers must guard with [`Self::is_in_flight`] first, per
    /// the contract in `spec.md` §4.2.
    pub fn source_of(&self, hash: &Hash256) -> PeerId {
        *self
            .owners
            .get(hash)
            .unwrap_or_else(|| panic!("source_of_in_flight_block called for {hash} which is not in flight"))
    }

    pub(crate) fn register(&mut self, hash: Hash256, peer_id: PeerId) {
        self.owners.insert(hash, peer_id);
    }

    pub(crate) fn unregister(&mut self, hash: &Hash256) {
        self.owners.remove(hash);
    }

    pub(crate) fn owner(&self, hash: &Hash256) -> Option<PeerId> {
        self.owners.get(hash).copied()
    }
}

/// Remove `hash` from wherever it is in flight, if anywhere: erases its
/// `QueuedBlock` from the owning peer's list, decrements that peer's
/// stalling marker and the global validated-headers counter, and drops the
/// global entry. No-op if `hash` is not in flight.
///
/// Free function (rather than a method on `InFlightRegistry`) because it
/// needs mutable access to both the registry and the owning `PeerState` at
/// once; `PeerRegistry` (which owns both) is the only caller.
pub(crate) fn mark_received(
    in_flight: &mut InFlightRegistry,
    peers: &mut HashMap<PeerId, PeerState>,
    queued_validated_headers: &mut usize,
    hash: &Hash256,
) {
    let Some(peer_id) = in_flight.owner(hash) else { return };
    let Some(peer) = peers.get_mut(&peer_id) else {
        in_flight.unregister(hash);
        return;
    };

    if let Some(pos) = peer.blocks_in_flight.iter().position(|e| &e.hash == hash) {
        let entry = peer.blocks_in_flight.remove(pos);
        if entry.has_validated_headers {
            *queued_validated_headers = queued_validated_headers.saturating_sub(1);
        }
    }
    peer.stalling_since = 0;
    in_flight.unregister(hash);
}
