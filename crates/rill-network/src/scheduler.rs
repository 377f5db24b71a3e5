//! `DownloadScheduler` — the synchronous handle embedding nodes talk to.
//!
//! Shaped after the teacher's [`crate::service`]-style node handle: a cheaply
//! cloneable struct wrapping shared state behind a lock, exposing a plain
//! method per inbound operation. Unlike that handle, there is no background
//! task and no channel — `spec.md` §5 rules out suspension points and
//! reentrancy inside the planner, so every method here takes the lock,
//! mutates state synchronously, and returns.

use std::sync::Arc;

use parking_lot::Mutex;
use rill_core::chain_index::{ActiveChain, ChainIndex};
use rill_core::types::{Hash256, PeerId};

use crate::collaborators::{AddressBook, OrphanPool};
use crate::config::SchedulerConfig;
use crate::peer_state::{ConnectInfo, ConnectionFlags, PeerState};
use crate::planner::{self, PlanResult};
use crate::registry::PeerRegistry;

/// Owns the single lock guarding every peer's sync state.
///
/// Cloning shares the same underlying registry — analogous to the teacher's
/// `NetworkNode` handle, which can be cloned freely because its command
/// channel is an `mpsc::Sender`.
#[derive(Clone)]
pub struct DownloadScheduler {
    config: SchedulerConfig,
    registry: Arc<Mutex<PeerRegistry>>,
}

impl DownloadScheduler {
    pub fn new(config: SchedulerConfig, address_book: Box<dyn AddressBook>, orphan_pool: Box<dyn OrphanPool>) -> Self {
        Self {
            config,
            registry: Arc::new(Mutex::new(PeerRegistry::new(address_book, orphan_pool))),
        }
    }

    pub fn config(&self) -> SchedulerConfig {
        self.config
    }

    /// `InitializeNode`. Panics if `peer_id` is already tracked.
    pub fn initialize_node(&self, peer_id: PeerId, connect_info: ConnectInfo) {
        self.registry.lock().initialize(peer_id, connect_info);
    }

    /// `FinalizeNode`. Panics if `peer_id` is not tracked.
    pub fn finalize_node(&self, peer_id: PeerId) {
        self.registry.lock().finalize(peer_id);
    }

    /// A snapshot copy of a peer's state, for callers that just want to read
    /// it (misbehavior scoring, diagnostics, RPC).
    pub fn peer_state(&self, peer_id: PeerId) -> Option<PeerState> {
        self.registry.lock().lookup(peer_id).cloned()
    }

    pub fn update_preferred_download(&self, peer_id: PeerId, flags: ConnectionFlags) {
        self.registry.lock().update_preferred_download(peer_id, flags);
    }

    pub fn have_preferred_download_peers(&self) -> bool {
        self.registry.lock().have_preferred_download_peers()
    }

    pub fn sync_started_peer_count(&self) -> usize {
        self.registry.lock().sync_started_peer_count()
    }

    pub fn record_peer_started_to_sync(&self, peer_id: PeerId) {
        self.registry.lock().record_peer_started_to_sync(peer_id);
    }

    pub fn mark_block_as_in_flight(&self, peer_id: PeerId, hash: Hash256, chain_index_ref: Option<Hash256>, now_micros: u64) {
        self.registry.lock().mark_block_as_in_flight(peer_id, hash, chain_index_ref, now_micros);
    }

    pub fn mark_block_as_received(&self, hash: &Hash256) {
        self.registry.lock().mark_block_as_received(hash);
    }

    pub fn block_is_in_flight(&self, hash: &Hash256) -> bool {
        self.registry.lock().block_is_in_flight(hash)
    }

    /// Panics if `hash` is not in flight; guard with [`Self::block_is_in_flight`].
    pub fn source_of_in_flight_block(&self, hash: &Hash256) -> PeerId {
        self.registry.lock().source_of_in_flight_block(hash)
    }

    pub fn update_block_availability(&self, peer_id: PeerId, hash: Hash256, index: &dyn ChainIndex) {
        let mut guard = self.registry.lock();
        let peer = guard.peer_mut_or_panic(peer_id);
        crate::availability::update_block_availability(peer, hash, index);
    }

    /// `FindNextBlocksToDownload`. Requires `peer_id` to already be tracked.
    pub fn find_next_blocks_to_download(
        &self,
        peer_id: PeerId,
        count: usize,
        index: &dyn ChainIndex,
        active_chain: &dyn ActiveChain,
    ) -> PlanResult {
        let mut guard = self.registry.lock();
        planner::find_next_blocks_to_download(
            &mut guard,
            peer_id,
            count,
            self.config.block_download_window,
            self.config.download_batch_floor,
            index,
            active_chain,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{InMemoryAddressBook, InMemoryOrphanPool};
    use rill_core::chain_index::{BlockStatus, BlockTree, ChainWork};

    fn h(n: u8) -> Hash256 {
        let mut bytes = [0u8; 32];
        bytes[0] = n;
        Hash256(bytes)
    }

    fn connect_info() -> ConnectInfo {
        ConnectInfo {
            name: "peer-a".into(),
            address: "127.0.0.1:1".parse().unwrap(),
            outbound: true,
            whitelisted: false,
            one_shot: false,
            light_client: false,
        }
    }

    #[test]
    fn lifecycle_is_clean_end_to_end() {
        let scheduler = DownloadScheduler::new(
            SchedulerConfig::testnet(),
            Box::new(InMemoryAddressBook::new()),
            Box::new(InMemoryOrphanPool::new()),
        );

        let peer_id = PeerId(1);
        scheduler.initialize_node(peer_id, connect_info());
        scheduler.update_preferred_download(
            peer_id,
            ConnectionFlags { outbound: true, whitelisted: false, one_shot: false, light_client: false },
        );
        assert!(scheduler.have_preferred_download_peers());

        scheduler.record_peer_started_to_sync(peer_id);
        assert_eq!(scheduler.sync_started_peer_count(), 1);

        let mut tree = BlockTree::new();
        tree.insert_genesis(h(0), ChainWork(1), BlockStatus::VALID_TREE | BlockStatus::HAVE_DATA);
        tree.insert(h(1), h(0), ChainWork(1), BlockStatus::VALID_TREE, 1);
        tree.set_active_tip(h(0));

        scheduler.update_block_availability(peer_id, h(1), &tree);
        assert_eq!(scheduler.peer_state(peer_id).unwrap().best_known_block, Some(h(1)));

        let plan = scheduler.find_next_blocks_to_download(peer_id, 4, &tree, &tree);
        assert_eq!(plan.blocks, vec![h(1)]);

        scheduler.mark_block_as_in_flight(peer_id, h(1), Some(h(1)), 1);
        assert!(scheduler.block_is_in_flight(&h(1)));
        assert_eq!(scheduler.source_of_in_flight_block(&h(1)), peer_id);

        scheduler.mark_block_as_received(&h(1));
        assert!(!scheduler.block_is_in_flight(&h(1)));

        scheduler.finalize_node(peer_id);
        assert!(scheduler.peer_state(peer_id).is_none());
        assert!(!scheduler.have_preferred_download_peers());
        assert_eq!(scheduler.sync_started_peer_count(), 0);
    }
}
