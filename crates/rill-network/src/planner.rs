//! `FindNextBlocksToDownload` — the core scheduling algorithm.
//!
//! Ported from `FindNextBlocksToDownload` in Divi's `NodeStateRegistry.cpp`:
//! bootstrap/correct `last_common_block` via `LastCommonAncestor`, compute a
//! window with a one-block lookahead, walk forward in batches resolved via
//! `GetAncestor`, and classify each block into one of four outcomes.

use rill_core::chain_index::{get_ancestor, last_common_ancestor, ActiveChain, BlockIndexEntry, BlockStatus, ChainIndex};
use rill_core::types::{Hash256, PeerId};
use tracing::debug;

use crate::availability::process_block_availability;
use crate::peer_state::PeerState;
use crate::registry::PeerRegistry;

/// Result of a single `find_next_blocks_to_download` call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlanResult {
    pub blocks: Vec<Hash256>,
    pub staller: Option<PeerId>,
}

/// Select up to `count` blocks to request from `peer_id`.
///
/// Requires the caller to already hold the registry's lock (this function
/// takes `&mut PeerRegistry` directly, not a guard). `index`/`active_chain`
/// are read-only and owned externally, per `spec.md` §5/§6.
pub fn find_next_blocks_to_download(
    registry: &mut PeerRegistry,
    peer_id: PeerId,
    count: usize,
    window: i64,
    batch_floor: usize,
    index: &dyn ChainIndex,
    active_chain: &dyn ActiveChain,
) -> PlanResult {
    let mut result = PlanResult::default();
    if count == 0 {
        return result;
    }

    let peer = registry.peer_mut_or_panic(peer_id);
    process_block_availability(peer, index);

    let Some(best_known) = peer.best_known_block else {
        return result;
    };
    let Some(best_known_entry) = index.get(&best_known) else {
        return result;
    };

    let Some(tip) = active_chain.tip() else {
        return result;
    };
    let Some(tip_entry) = index.get(&tip) else {
        return result;
    };
    if best_known_entry.chain_work < tip_entry.chain_work {
        return result;
    }

    bootstrap_last_common_block(peer, &best_known_entry, active_chain);

    let last_common = peer.last_common_block.expect("bootstrapped above");
    let corrected = last_common_ancestor(index, &last_common, &best_known).unwrap_or(last_common);
    peer.last_common_block = Some(corrected);

    if corrected == best_known {
        return result;
    }

    let last_common_entry = index.get(&corrected).expect("just resolved via index");
    let window_end = last_common_entry.height + window;
    let max_height = best_known_entry.height.min(window_end + 1);

    walk_forward(registry, peer_id, count, batch_floor, window_end, max_height, &best_known, index, &mut result);
    result
}

fn bootstrap_last_common_block(peer: &mut PeerState, best_known_entry: &BlockIndexEntry, active_chain: &dyn ActiveChain) {
    if peer.last_common_block.is_some() {
        return;
    }
    let height = best_known_entry.height.min(active_chain.height());
    peer.last_common_block = active_chain.hash_at_height(height);
}

#[allow(clippy::too_many_arguments)]
fn walk_forward(
    registry: &mut PeerRegistry,
    peer_id: PeerId,
    count: usize,
    batch_floor: usize,
    window_end: i64,
    max_height: i64,
    best_known: &Hash256,
    index: &dyn ChainIndex,
    result: &mut PlanResult,
) {
    let mut current_height = index.get(&registry.lookup(peer_id).unwrap().last_common_block.unwrap()).unwrap().height;
    let mut waiting_for_peer: Option<PeerId> = None;

    while current_height < max_height {
        let batch_size = (count.saturating_sub(result.blocks.len())).max(batch_floor);
        let batch_target_height = (current_height + batch_size as i64).min(max_height);
        let batch = resolve_batch(index, best_known, current_height, batch_target_height);
        if batch.is_empty() {
            return;
        }

        for hash in batch {
            let Some(entry) = index.get(&hash) else { return };

            if !entry.status.contains(BlockStatus::VALID_TREE) {
                debug!(%peer_id, height = entry.height, "planner: tree-invalid block, aborting request");
                return;
            }

            if entry.status.contains(BlockStatus::HAVE_DATA) && entry.chain_tx.is_some() {
                registry.lookup_mut(peer_id).unwrap().last_common_block = Some(hash);
                current_height = entry.height;
                continue;
            }

            if !registry.block_is_in_flight(&hash) {
                if entry.height > window_end {
                    if result.blocks.is_empty() {
                        result.staller = waiting_for_peer.filter(|&p| p != peer_id);
                    }
                    return;
                }
                result.blocks.push(hash);
                current_height = entry.height;
                if result.blocks.len() == count {
                    return;
                }
            } else {
                if waiting_for_peer.is_none() {
                    waiting_for_peer = Some(registry.source_of_in_flight_block(&hash));
                }
                current_height = entry.height;
            }
        }
    }
}

/// Resolve the forward-ordered sequence of hashes in `(from_height,
/// to_height]` by taking `best_known.GetAncestor(to_height)` and walking
/// `prev` pointers back down to `from_height`, then reversing — exactly the
/// batching `FindNextBlocksToDownload` uses to amortize ancestor lookups.
fn resolve_batch(index: &dyn ChainIndex, best_known: &Hash256, from_height: i64, to_height: i64) -> Vec<Hash256> {
    let Some(mut hash) = get_ancestor(index, best_known, to_height) else { return Vec::new() };
    let mut segment = Vec::new();
    loop {
        let Some(entry) = index.get(&hash) else { break };
        if entry.height <= from_height {
            break;
        }
        segment.push(hash);
        let Some(prev) = entry.prev else { break };
        hash = prev;
    }
    segment.reverse();
    segment
}
