//! The block index the download planner plans against.
//!
//! `ChainIndex` and `ActiveChain` are the read-only boundary this crate
//! consumes — in a full node they are owned by whatever component validates
//! headers and manages the best-chain selection. `BlockTree` is an in-memory
//! implementation of both, provided so the scheduler in `rill-network` has
//! something concrete to run its tests and benchmarks against; it is not
//! meant to back a production node (no pruning, no persistence).

use std::collections::HashMap;

use bitflags::bitflags;

use crate::types::Hash256;

/// Cumulative proof-of-work behind a block, used only for its total order.
///
/// The real network's work accumulator is a 256-bit integer derived from
/// compact difficulty bits; representing that exactly isn't needed to
/// implement or test the scheduling algorithm, only the total order it
/// induces, so this is a plain `u128`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct ChainWork(pub u128);

impl ChainWork {
    pub const ZERO: ChainWork = ChainWork(0);

    pub fn add(self, increment: ChainWork) -> ChainWork {
        ChainWork(self.0 + increment.0)
    }
}

bitflags! {
    /// Subset of Bitcoin/Divi's `nStatus` bits relevant to download planning.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BlockStatus: u8 {
        /// Header connects to a chain back to genesis with no known
        /// consensus violation (`BLOCK_VALID_TREE`). Planner aborts a
        /// branch the moment it walks onto a block lacking this bit.
        const VALID_TREE = 0b01;
        /// Full block contents have been downloaded and stored
        /// (`BLOCK_HAVE_DATA`).
        const HAVE_DATA  = 0b10;
    }
}

/// One node in the block tree: everything the planner needs about a block
/// without ever touching the block's contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockIndexEntry {
    pub hash: Hash256,
    pub prev: Option<Hash256>,
    /// Skip-list pointer (Bitcoin's `pskip`): an ancestor at `GetSkipHeight(height)`,
    /// maintained so ancestor walks are logarithmic instead of linear.
    pub skip: Option<Hash256>,
    pub height: i64,
    pub chain_work: ChainWork,
    pub status: BlockStatus,
    /// Number of transactions in the chain from genesis to this block,
    /// known only once this block and every ancestor has `HAVE_DATA` set.
    /// `None` mirrors Bitcoin's `nChainTx == 0` ("unknown").
    pub chain_tx: Option<u64>,
}

impl BlockIndexEntry {
    pub fn have_data_and_known(&self) -> bool {
        self.status.contains(BlockStatus::HAVE_DATA) && self.chain_tx.is_some()
    }
}

/// Read-only view of the block tree: every header ever seen, valid or not,
/// connected to its parent.
pub trait ChainIndex {
    fn get(&self, hash: &Hash256) -> Option<BlockIndexEntry>;

    /// Ancestor of `hash` at `height`, or `None` if `height` is negative or
    /// above `hash`'s own height. Implementations should use the skip-list
    /// walk in [`get_ancestor`] rather than a linear `prev` walk.
    fn get_ancestor(&self, hash: &Hash256, height: i64) -> Option<Hash256> {
        get_ancestor(self, hash, height)
    }
}

/// Read-only view of the currently-selected best chain.
pub trait ActiveChain {
    /// Height of the tip, or `-1` if the chain is empty.
    fn height(&self) -> i64;

    fn tip(&self) -> Option<Hash256>;

    fn hash_at_height(&self, height: i64) -> Option<Hash256>;

    fn contains(&self, hash: &Hash256) -> bool;
}

/// Walk from `hash` down to `height` using skip pointers where possible.
///
/// Direct port of Bitcoin/Divi's `CBlockIndex::GetAncestor`: at each step,
/// prefer jumping via `pskip` when doing so doesn't overshoot past `height`,
/// otherwise fall back to a single `prev` step. Amortized logarithmic in the
/// distance walked.
pub fn get_ancestor<I: ChainIndex + ?Sized>(index: &I, hash: &Hash256, height: i64) -> Option<Hash256> {
    let start = index.get(hash)?;
    if height > start.height || height < 0 {
        return None;
    }

    let mut walk_hash = *hash;
    let mut walk_height = start.height;

    while walk_height > height {
        let entry = index.get(&walk_hash)?;
        let height_skip = skip_height(walk_height);
        let height_skip_prev = skip_height(walk_height - 1);
        let take_skip = entry.skip.is_some()
            && (height_skip == height
                || (height_skip > height
                    && !(height_skip_prev < height_skip - 2 && height_skip_prev >= height)));

        if take_skip {
            walk_hash = entry.skip.unwrap();
            walk_height = height_skip;
        } else {
            walk_hash = entry.prev?;
            walk_height -= 1;
        }
    }

    Some(walk_hash)
}

/// Highest block both `a` and `b` descend from, or `None` if either is
/// unknown to `index`. Direct port of `LastCommonAncestor`.
pub fn last_common_ancestor<I: ChainIndex + ?Sized>(
    index: &I,
    a: &Hash256,
    b: &Hash256,
) -> Option<Hash256> {
    let mut entry_a = index.get(a)?;
    let mut entry_b = index.get(b)?;

    let mut hash_a = *a;
    let mut hash_b = *b;

    if entry_a.height > entry_b.height {
        hash_a = index.get_ancestor(&hash_a, entry_b.height)?;
        entry_a = index.get(&hash_a)?;
    } else if entry_b.height > entry_a.height {
        hash_b = index.get_ancestor(&hash_b, entry_a.height)?;
        entry_b = index.get(&hash_b)?;
    }

    while hash_a != hash_b {
        hash_a = entry_a.prev?;
        hash_b = entry_b.prev?;
        entry_a = index.get(&hash_a)?;
        entry_b = index.get(&hash_b)?;
    }

    Some(hash_a)
}

fn invert_lowest_one(n: i64) -> i64 {
    n & (n - 1)
}

fn skip_height(height: i64) -> i64 {
    if height < 2 {
        return 0;
    }
    if height & 1 != 0 {
        invert_lowest_one(invert_lowest_one(height - 1)) + 1
    } else {
        invert_lowest_one(height)
    }
}

/// In-memory `ChainIndex` + `ActiveChain` for tests and benchmarks.
#[derive(Debug, Default)]
pub struct BlockTree {
    entries: HashMap<Hash256, BlockIndexEntry>,
    active: Vec<Hash256>,
}

impl BlockTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the genesis block. Height 0, no parent.
    pub fn insert_genesis(&mut self, hash: Hash256, work: ChainWork, status: BlockStatus) {
        let chain_tx = if status.contains(BlockStatus::HAVE_DATA) { Some(1) } else { None };
        self.entries.insert(
            hash,
            BlockIndexEntry {
                hash,
                prev: None,
                skip: None,
                height: 0,
                chain_work: work,
                status,
                chain_tx,
            },
        );
        self.active = vec![hash];
    }

    /// Insert a header whose parent is already known. `work_increment` is
    /// the proof-of-work this block alone contributes; the entry's
    /// `chain_work` is the parent's plus this increment. `n_tx` is the
    /// number of transactions in this block, used to extend `chain_tx` when
    /// `status` carries `HAVE_DATA` and the parent's `chain_tx` is known.
    pub fn insert(
        &mut self,
        hash: Hash256,
        prev: Hash256,
        work_increment: ChainWork,
        status: BlockStatus,
        n_tx: u64,
    ) -> bool {
        let Some(parent) = self.entries.get(&prev).cloned() else {
            return false;
        };
        let height = parent.height + 1;
        let chain_work = parent.chain_work.add(work_increment);
        let chain_tx = if status.contains(BlockStatus::HAVE_DATA) {
            parent.chain_tx.map(|prev_tx| prev_tx + n_tx)
        } else {
            None
        };
        let skip_h = skip_height(height);
        let skip = get_ancestor(&*self, &prev, skip_h);
        self.entries.insert(
            hash,
            BlockIndexEntry { hash, prev: Some(prev), skip, height, chain_work, status, chain_tx },
        );
        true
    }

    /// Mark a previously-headers-only block as having had its data
    /// received, setting `chain_tx` from the parent's known cumulative
    /// count. Returns `false` if `hash` is unknown or the parent's
    /// `chain_tx` is still unknown (data must be marked in connect order,
    /// same as upstream).
    pub fn mark_have_data(&mut self, hash: &Hash256, n_tx: u64) -> bool {
        let Some(entry) = self.entries.get(hash).cloned() else { return false };
        let parent_chain_tx = match entry.prev {
            None => Some(0),
            Some(prev) => self.entries.get(&prev).and_then(|p| p.chain_tx),
        };
        let Some(parent_chain_tx) = parent_chain_tx else { return false };
        if let Some(e) = self.entries.get_mut(hash) {
            e.status.insert(BlockStatus::HAVE_DATA);
            e.chain_tx = Some(parent_chain_tx + n_tx);
        }
        true
    }

    /// Rebuild the active chain by walking `prev` pointers from `tip` back
    /// to genesis. Fails (returns `false`, leaving the prior active chain
    /// untouched) if `tip` is unknown.
    pub fn set_active_tip(&mut self, tip: Hash256) -> bool {
        let Some(mut entry) = self.entries.get(&tip).cloned() else { return false };
        let mut chain = vec![entry.hash];
        while let Some(prev) = entry.prev {
            chain.push(prev);
            entry = match self.entries.get(&prev) {
                Some(e) => e.clone(),
                None => return false,
            };
        }
        chain.reverse();
        self.active = chain;
        true
    }
}

impl ChainIndex for BlockTree {
    fn get(&self, hash: &Hash256) -> Option<BlockIndexEntry> {
        self.entries.get(hash).cloned()
    }
}

impl ActiveChain for BlockTree {
    fn height(&self) -> i64 {
        self.active.len() as i64 - 1
    }

    fn tip(&self) -> Option<Hash256> {
        self.active.last().copied()
    }

    fn hash_at_height(&self, height: i64) -> Option<Hash256> {
        if height < 0 {
            return None;
        }
        self.active.get(height as usize).copied()
    }

    fn contains(&self, hash: &Hash256) -> bool {
        self.entries
            .get(hash)
            .and_then(|e| self.active.get(e.height as usize).map(|h| h == hash))
            .unwrap_or(false)
    }
}
