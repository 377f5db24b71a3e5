//! `PeerRegistry` — lifecycle and bookkeeping for every connected peer.
//!
//! Ported from Divi's `NodeStateRegistry` (`InitializeNode`/`FinalizeNode`/
//! `State`/`UpdatePreferredDownload`/`RecordNodeStartedToSync`). Every
//! operation here requires the caller to already hold the main lock — see
//! `DownloadScheduler` for the guarded handle an embedding node actually
//! talks to.

use std::collections::HashMap;

use rill_core::types::{Hash256, PeerId};
use tracing::{debug, info, warn};

use crate::collaborators::{AddressBook, OrphanPool};
use crate::in_flight::{self, InFlightRegistry};
use crate::peer_state::{ConnectInfo, ConnectionFlags, PeerState, QueuedBlock};

pub struct PeerRegistry {
    peers: HashMap<PeerId, PeerState>,
    in_flight: InFlightRegistry,
    preferred_download_peers: usize,
    sync_started_peers: usize,
    queued_validated_headers: usize,
    address_book: Box<dyn AddressBook>,
    orphan_pool: Box<dyn OrphanPool>,
}

impl PeerRegistry {
    pub fn new(address_book: Box<dyn AddressBook>, orphan_pool: Box<dyn OrphanPool>) -> Self {
        Self {
            peers: HashMap::new(),
            in_flight: InFlightRegistry::new(),
            preferred_download_peers: 0,
            sync_started_peers: 0,
            queued_validated_headers: 0,
            address_book,
            orphan_pool,
        }
    }

    /// Insert a fresh `PeerState`. Panics (§7: "programming-invariant
    /// violation") if `peer_id` is already tracked.
    pub fn initialize(&mut self, peer_id: PeerId, connect_info: ConnectInfo) {
        if self.peers.contains_key(&peer_id) {
            panic!("Initialize called for already-tracked peer {peer_id}");
        }
        debug!(%peer_id, name = %connect_info.name, "registry: peer initialized");
        self.peers.insert(peer_id, PeerState::new(&connect_info));
    }

    /// Runs the full disconnect cleanup sequence from `spec.md` §3
    /// (lifecycle) and §4.1. Panics if `peer_id` is not tracked — disconnect
    /// notifications are only ever raised for peers that were initialized.
    pub fn finalize(&mut self, peer_id: PeerId) {
        let Some(peer) = self.peers.remove(&peer_id) else {
            panic!("Finalize called for unknown peer {peer_id}");
        };

        if peer.sync_started {
            self.sync_started_peers = self.sync_started_peers.saturating_sub(1);
        }

        if peer.misbehavior_score == 0 && peer.currently_connected {
            if let Err(err) = self.address_book.record_currently_connected(peer.address) {
                warn!(%peer_id, %err, "registry: failed to record address as currently-connected");
            }
        }

        for entry in &peer.blocks_in_flight {
            self.in_flight.unregister(&entry.hash);
            if entry.has_validated_headers {
                self.queued_validated_headers = self.queued_validated_headers.saturating_sub(1);
            }
        }

        if let Err(err) = self.orphan_pool.erase_orphans_for(peer_id) {
            warn!(%peer_id, %err, "registry: failed to erase orphans for disconnecting peer");
        }

        if peer.preferred_download {
            self.preferred_download_peers = self.preferred_download_peers.saturating_sub(1);
        }

        info!(%peer_id, "registry: peer finalized");
    }

    pub fn lookup(&self, peer_id: PeerId) -> Option<&PeerState> {
        self.peers.get(&peer_id)
    }

    pub fn lookup_mut(&mut self, peer_id: PeerId) -> Option<&mut PeerState> {
        self.peers.get_mut(&peer_id)
    }

    /// Panics if `peer_id` is unknown — used by operations whose contract
    /// requires a live peer (mirrors Divi's `assert(state != NULL)`).
    pub(crate) fn peer_mut_or_panic(&mut self, peer_id: PeerId) -> &mut PeerState {
        self.peers
            .get_mut(&peer_id)
            .unwrap_or_else(|| panic!("operation requires known peer {peer_id}"))
    }

    pub fn peers(&self) -> &HashMap<PeerId, PeerState> {
        &self.peers
    }

    pub fn queued_validated_headers(&self) -> usize {
        self.queued_validated_headers
    }

    /// Recomputes `preferred_download` and updates the global counter by the
    /// resulting delta. Must be called whenever any input flag changes.
    pub fn update_preferred_download(&mut self, peer_id: PeerId, flags: ConnectionFlags) {
        let peer = self.peer_mut_or_panic(peer_id);
        peer.outbound = flags.outbound;
        peer.whitelisted = flags.whitelisted;
        peer.one_shot = flags.one_shot;
        peer.light_client = flags.light_client;

        let was = peer.preferred_download;
        let now = peer.recompute_preferred_download();
        peer.preferred_download = now;

        match (was, now) {
            (false, true) => self.preferred_download_peers += 1,
            (true, false) => self.preferred_download_peers = self.preferred_download_peers.saturating_sub(1),
            _ => {}
        }
    }

    pub fn have_preferred_download_peers(&self) -> bool {
        self.preferred_download_peers > 0
    }

    pub fn sync_started_peer_count(&self) -> usize {
        self.sync_started_peers
    }

    /// Marks `peer_id` as having started a sync and bumps the global
    /// counter. The symmetric decrement happens in `Finalize` or when a
    /// caller explicitly clears the per-peer flag via
    /// [`clear_sync_started`](Self::clear_sync_started).
    pub fn record_peer_started_to_sync(&mut self, peer_id: PeerId) {
        let peer = self.peer_mut_or_panic(peer_id);
        if !peer.sync_started {
            peer.sync_started = true;
            self.sync_started_peers += 1;
        }
    }

    pub fn clear_sync_started(&mut self, peer_id: PeerId) {
        let peer = self.peer_mut_or_panic(peer_id);
        if peer.sync_started {
            peer.sync_started = false;
            self.sync_started_peers = self.sync_started_peers.saturating_sub(1);
        }
    }

    /// Dedup-then-insert: if `hash` is already in flight anywhere, release
    /// it first (§4.2: "silently reconciled"). Panics if `peer_id` is
    /// unknown.
    pub fn mark_block_as_in_flight(&mut self, peer_id: PeerId, hash: Hash256, chain_index_ref: Option<Hash256>, now_micros: u64) {
        if self.in_flight.is_in_flight(&hash) {
            self.mark_block_as_received(&hash);
        }

        let queued_validated_headers = self.queued_validated_headers;
        let peer = self.peer_mut_or_panic(peer_id);
        let entry = QueuedBlock::new(hash, chain_index_ref, now_micros, queued_validated_headers as u64);
        let has_validated_headers = entry.has_validated_headers;
        peer.blocks_in_flight.push(entry);
        if has_validated_headers {
            self.queued_validated_headers += 1;
        }
        self.in_flight.register(hash, peer_id);
    }

    pub fn mark_block_as_received(&mut self, hash: &Hash256) {
        in_flight::mark_received(&mut self.in_flight, &mut self.peers, &mut self.queued_validated_headers, hash);
    }

    pub fn block_is_in_flight(&self, hash: &Hash256) -> bool {
        self.in_flight.is_in_flight(hash)
    }

    /// Panics if `hash` is not in flight; guard with [`Self::block_is_in_flight`].
    pub fn source_of_in_flight_block(&self, hash: &Hash256) -> PeerId {
        self.in_flight.source_of(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{InMemoryAddressBook, InMemoryOrphanPool};

    fn registry() -> PeerRegistry {
        PeerRegistry::new(Box::new(InMemoryAddressBook::new()), Box::new(InMemoryOrphanPool::new()))
    }

    fn connect_info(name: &str) -> ConnectInfo {
        ConnectInfo {
            name: name.into(),
            address: "127.0.0.1:1".parse().unwrap(),
            outbound: true,
            whitelisted: false,
            one_shot: false,
            light_client: false,
        }
    }

    fn h(n: u8) -> Hash256 {
        let mut bytes = [0u8; 32];
        bytes[0] = n;
        Hash256(bytes)
    }

    #[test]
    #[should_panic]
    fn initialize_twice_panics() {
        let mut reg = registry();
        reg.initialize(PeerId(1), connect_info("a"));
        reg.initialize(PeerId(1), connect_info("a-again"));
    }

    #[test]
    #[should_panic]
    fn finalize_unknown_peer_panics() {
        let mut reg = registry();
        reg.finalize(PeerId(99));
    }

    #[test]
    fn preferred_download_counter_tracks_flag() {
        let mut reg = registry();
        reg.initialize(PeerId(1), connect_info("a"));
        assert!(!reg.have_preferred_download_peers());

        reg.update_preferred_download(PeerId(1), ConnectionFlags { outbound: true, whitelisted: false, one_shot: false, light_client: false });
        assert!(reg.have_preferred_download_peers());

        reg.update_preferred_download(PeerId(1), ConnectionFlags { outbound: false, whitelisted: false, one_shot: false, light_client: false });
        assert!(!reg.have_preferred_download_peers());
    }

    #[test]
    fn sync_started_counter_is_idempotent() {
        let mut reg = registry();
        reg.initialize(PeerId(1), connect_info("a"));
        reg.record_peer_started_to_sync(PeerId(1));
        reg.record_peer_started_to_sync(PeerId(1));
        assert_eq!(reg.sync_started_peer_count(), 1);
        reg.clear_sync_started(PeerId(1));
        assert_eq!(reg.sync_started_peer_count(), 0);
    }

    #[test]
    fn mark_in_flight_dedups_across_peers() {
        let mut reg = registry();
        reg.initialize(PeerId(1), connect_info("a"));
        reg.initialize(PeerId(2), connect_info("b"));

        reg.mark_block_as_in_flight(PeerId(1), h(1), Some(h(1)), 100);
        assert_eq!(reg.source_of_in_flight_block(&h(1)), PeerId(1));

        reg.mark_block_as_in_flight(PeerId(2), h(1), Some(h(1)), 200);
        assert_eq!(reg.source_of_in_flight_block(&h(1)), PeerId(2));
        assert_eq!(reg.lookup(PeerId(1)).unwrap().blocks_in_flight_count(), 0);
        assert_eq!(reg.lookup(PeerId(2)).unwrap().blocks_in_flight_count(), 1);
    }

    #[test]
    fn finalize_cleans_up_in_flight_and_counters() {
        let mut reg = registry();
        reg.initialize(PeerId(1), connect_info("a"));
        reg.record_peer_started_to_sync(PeerId(1));
        reg.update_preferred_download(PeerId(1), ConnectionFlags { outbound: true, whitelisted: false, one_shot: false, light_client: false });
        reg.mark_block_as_in_flight(PeerId(1), h(1), Some(h(1)), 1);
        reg.mark_block_as_in_flight(PeerId(1), h(2), None, 2);
        assert_eq!(reg.queued_validated_headers(), 1);

        reg.finalize(PeerId(1));

        assert!(reg.lookup(PeerId(1)).is_none());
        assert!(!reg.block_is_in_flight(&h(1)));
        assert!(!reg.block_is_in_flight(&h(2)));
        assert_eq!(reg.queued_validated_headers(), 0);
        assert_eq!(reg.sync_started_peer_count(), 0);
        assert!(!reg.have_preferred_download_peers());
    }

    #[test]
    fn finalize_records_address_only_when_clean() {
        use parking_lot::Mutex;
        use std::sync::Arc;

        let address_book = Arc::new(Mutex::new(InMemoryAddressBook::new()));
        let orphan_pool = Arc::new(Mutex::new(InMemoryOrphanPool::new()));
        let mut reg = PeerRegistry::new(Box::new(address_book.clone()), Box::new(orphan_pool.clone()));

        let addr: std::net::SocketAddr = "127.0.0.1:9".parse().unwrap();
        let mut info = connect_info("a");
        info.address = addr;
        reg.initialize(PeerId(1), info);
        reg.finalize(PeerId(1));

        assert_eq!(address_book.lock().recorded(), &[addr]);
        assert_eq!(orphan_pool.lock().erase_calls(), &[PeerId(1)]);

        // A peer with a nonzero misbehavior score must not be recorded.
        let mut dirty = connect_info("b");
        dirty.address = "127.0.0.1:10".parse().unwrap();
        reg.initialize(PeerId(2), dirty);
        reg.peer_mut_or_panic(PeerId(2)).add_misbehavior(1);
        reg.finalize(PeerId(2));
        assert_eq!(address_book.lock().recorded(), &[addr], "misbehaving peer must not be recorded");
    }
}
