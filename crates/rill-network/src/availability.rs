//! Tracks a peer's best-known block as headers/invs arrive.

use rill_core::chain_index::ChainIndex;
use rill_core::types::Hash256;

use crate::peer_state::PeerState;

/// `true` if `candidate`'s chain-work is positive and at least that of
/// `current` (absent `current` counts as worst). The `≥` tie-break is
/// deliberate (see `spec.md` §9 Open Question): equal-work siblings may
/// replace the known tip.
fn promotes(index: &dyn ChainIndex, candidate: &Hash256, current: Option<Hash256>) -> bool {
    let Some(candidate_entry) = index.get(candidate) else { return false };
    if candidate_entry.chain_work.0 == 0 {
        return false;
    }
    match current {
        None => true,
        Some(current_hash) => match index.get(&current_hash) {
            Some(current_entry) => candidate_entry.chain_work >= current_entry.chain_work,
            None => true,
        },
    }
}

/// Resolve a pending unknown announcement, if any, against `index`.
/// Idempotent: a miss leaves `last_unknown_block` untouched for the next call.
pub fn process_block_availability(peer: &mut PeerState, index: &dyn ChainIndex) {
    if peer.last_unknown_block.is_zero() {
        return;
    }
    let candidate = peer.last_unknown_block;
    if promotes(index, &candidate, peer.best_known_block) {
        peer.best_known_block = Some(candidate);
        peer.last_unknown_block = Hash256::ZERO;
    }
}

/// Record a newly announced block hash, promoting `best_known_block` if it
/// resolves to something better, else deferring it as the pending unknown.
///
/// Mirrors the original's two-level `if (found && nChainWork>0) { maybe
/// promote } else { defer }`: a hash that's absent from the index *or*
/// present with zero chain-work both fall into the deferred case, not just
/// an absent one.
pub fn update_block_availability(peer: &mut PeerState, hash: Hash256, index: &dyn ChainIndex) {
    process_block_availability(peer, index);

    let found_with_work = index.get(&hash).is_some_and(|entry| entry.chain_work.0 > 0);
    if found_with_work {
        if promotes(index, &hash, peer.best_known_block) {
            peer.best_known_block = Some(hash);
        }
    } else {
        peer.last_unknown_block = hash;
    }
}
