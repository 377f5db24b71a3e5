//! External collaborators the registry calls out to but does not own.
//!
//! `spec.md` §6 lists `RecordAddressAsCurrentlyConnected` and
//! `EraseOrphansFor` as outbound calls with no in-repo implementation —
//! address-book persistence and orphan-transaction bookkeeping are both
//! explicit Non-goals. Modeled as traits so `Finalize` can call them without
//! this crate owning either subsystem, grounded in the same shape the
//! now-retired `rill-node` used for its orphan pools: a capacity-bounded,
//! age-evicting `Mutex<HashMap<Hash256, (T, Instant)>>`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rill_core::error::SchedulerError;
use rill_core::types::PeerId;

/// Records that an address behaved well enough to be worth reconnecting to
/// later. Real implementations persist this to the address manager's
/// on-disk table; out of scope here. Fallible because the real
/// implementation is backed by I/O (the on-disk `peers.dat` table); a
/// failure here is logged by the caller rather than escalated, per
/// `spec.md` §7 and [`SchedulerError`]'s own doc comment.
pub trait AddressBook: Send {
    fn record_currently_connected(&mut self, address: SocketAddr) -> Result<(), SchedulerError>;
}

/// Drops any orphan transactions attributed to a disconnecting peer.
pub trait OrphanPool: Send {
    fn erase_orphans_for(&mut self, peer_id: PeerId) -> Result<(), SchedulerError>;
}

impl<T: AddressBook + ?Sized> AddressBook for Arc<Mutex<T>> {
    fn record_currently_connected(&mut self, address: SocketAddr) -> Result<(), SchedulerError> {
        self.lock().record_currently_connected(address)
    }
}

impl<T: OrphanPool + ?Sized> OrphanPool for Arc<Mutex<T>> {
    fn erase_orphans_for(&mut self, peer_id: PeerId) -> Result<(), SchedulerError> {
        self.lock().erase_orphans_for(peer_id)
    }
}

/// Test-only `AddressBook`: just remembers the order addresses arrived in.
#[derive(Debug, Default)]
pub struct InMemoryAddressBook {
    recorded: Vec<SocketAddr>,
}

impl InMemoryAddressBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> &[SocketAddr] {
        &self.recorded
    }
}

impl AddressBook for InMemoryAddressBook {
    fn record_currently_connected(&mut self, address: SocketAddr) -> Result<(), SchedulerError> {
        self.recorded.push(address);
        Ok(())
    }
}

const ORPHAN_TX_CAPACITY: usize = 1000;
const ORPHAN_TX_EXPIRY: Duration = Duration::from_secs(300);

/// Test-only `OrphanPool`: a capacity- and age-bounded map from peer to the
/// orphan transaction hashes it's attributed with, matching the eviction
/// policy the teacher's node used for its own orphan pools.
#[derive(Debug, Default)]
pub struct InMemoryOrphanPool {
    by_peer: HashMap<PeerId, Instant>,
    erase_calls: Vec<PeerId>,
}

impl InMemoryOrphanPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, peer_id: PeerId) {
        self.evict_expired();
        if self.by_peer.len() >= ORPHAN_TX_CAPACITY {
            return;
        }
        self.by_peer.insert(peer_id, Instant::now());
    }

    fn evict_expired(&mut self) {
        self.by_peer.retain(|_, inserted_at| inserted_at.elapsed() < ORPHAN_TX_EXPIRY);
    }

    pub fn erase_calls(&self) -> &[PeerId] {
        &self.erase_calls
    }
}

impl OrphanPool for InMemoryOrphanPool {
    fn erase_orphans_for(&mut self, peer_id: PeerId) -> Result<(), SchedulerError> {
        self.by_peer.remove(&peer_id);
        self.erase_calls.push(peer_id);
        Ok(())
    }
}
