//! Scheduler-tuning constants.

/// Default bound on the sliding download window: how far ahead of
/// `last_common_block` the planner is willing to queue blocks, per peer,
/// before it stops extending the window and instead declares a stall.
///
/// Mirrors Bitcoin/Divi's `BLOCK_DOWNLOAD_WINDOW` (1024).
pub const BLOCK_DOWNLOAD_WINDOW: i64 = 1024;

/// How many ancestor-chain blocks the planner resolves per `GetAncestor`
/// batch while walking forward from `last_common_block`. Divi computes this
/// dynamically as `max(count - already_queued, 128)`; 128 is the floor.
pub const DOWNLOAD_BATCH_FLOOR: usize = 128;

/// Maximum number of blocks permitted in flight from a single peer at once
/// (`MAX_BLOCKS_IN_TRANSIT_PER_PEER` upstream).
pub const MAX_BLOCKS_IN_FLIGHT_PER_PEER: usize = 16;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_is_positive() {
        assert!(BLOCK_DOWNLOAD_WINDOW > 0);
    }
}
