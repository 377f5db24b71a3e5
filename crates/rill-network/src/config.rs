//! Tunable scheduler parameters.

use rill_core::constants;
use rill_core::error::SchedulerError;

/// Parameters governing the download planner's window and batching.
///
/// Follows the teacher's `NetworkConfig` shape (a plain struct with a
/// `Default` plus named presets) rather than a builder, since there are
/// only a handful of knobs and they rarely change at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// How far ahead of `last_common_block` the planner will queue blocks
    /// before declaring the window exhausted.
    pub block_download_window: i64,
    /// Floor on how many ancestors are resolved per `GetAncestor` batch.
    pub download_batch_floor: usize,
    /// Cap on outstanding requests to a single peer.
    pub max_blocks_in_flight_per_peer: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            block_download_window: constants::BLOCK_DOWNLOAD_WINDOW,
            download_batch_floor: constants::DOWNLOAD_BATCH_FLOOR,
            max_blocks_in_flight_per_peer: constants::MAX_BLOCKS_IN_FLIGHT_PER_PEER,
        }
    }
}

impl SchedulerConfig {
    /// A small window, useful for exercising window-boundary behaviour in
    /// tests without constructing thousands of blocks.
    pub fn testnet() -> Self {
        Self {
            block_download_window: 16,
            download_batch_floor: 8,
            max_blocks_in_flight_per_peer: 4,
        }
    }

    /// Sanity-checks a config loaded from an external source (CLI flags,
    /// config file) before it is handed to [`crate::scheduler::DownloadScheduler::new`].
    /// Not called internally — `Default`/`testnet` are always valid by
    /// construction — but exposed so an embedding node can surface a
    /// configuration mistake as a log line instead of nonsensical scheduling
    /// behavior (an empty window never returns blocks; a zero batch floor
    /// makes every walk re-resolve `GetAncestor` one block at a time).
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.block_download_window <= 0 {
            return Err(SchedulerError::InvalidConfig(format!(
                "block_download_window must be positive, got {}",
                self.block_download_window
            )));
        }
        if self.download_batch_floor == 0 {
            return Err(SchedulerError::InvalidConfig("download_batch_floor must be nonzero".into()));
        }
        if self.max_blocks_in_flight_per_peer == 0 {
            return Err(SchedulerError::InvalidConfig("max_blocks_in_flight_per_peer must be nonzero".into()));
        }
        Ok(())
    }
}
