//! Peer scoring and banning system.
//!
//! Tracks per-peer scores based on observed behaviour. Peers that send invalid
//! blocks, invalid transactions, or time out repeatedly accumulate negative
//! score. Once a peer's score drops to or below [`BAN_THRESHOLD`] it is banned
//! for [`BAN_DURATION`]. Good behaviour (valid blocks/headers) earns positive
//! score, capped at `+100`.

use rill_core::types::PeerId;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Penalty applied when a peer sends an invalid block.
pub const PENALTY_INVALID_BLOCK: i64 = -100;
/// Penalty applied when a peer sends invalid headers.
pub const PENALTY_INVALID_HEADERS: i64 = -50;
/// Penalty applied when a peer times out on a request.
pub const PENALTY_TIMEOUT: i64 = -10;
/// Penalty applied when a peer sends an invalid transaction.
pub const PENALTY_INVALID_TRANSACTION: i64 = -25;
/// Penalty applied when a peer sends a duplicate message.
pub const PENALTY_DUPLICATE_MESSAGE: i64 = -5;

/// Score threshold at which a peer is banned.
pub const BAN_THRESHOLD: i64 = -200;

/// How long a ban lasts.
pub const BAN_DURATION: Duration = Duration::from_secs(24 * 60 * 60); // 24 hours

/// Score bonus awarded when a peer provides a valid block.
pub const BONUS_VALID_BLOCK: i64 = 10;
/// Score bonus awarded when a peer provides valid headers.
pub const BONUS_VALID_HEADERS: i64 = 5;

/// Maximum score a peer can accumulate (rewards are capped at this value).
const MAX_SCORE: i64 = 100;

/// Per-peer score record.
#[derive(Debug, Clone)]
pub struct PeerScore {
    /// Cumulative score (starts at 0, negative is bad).
    pub score: i64,
    /// When this peer was banned (`None` if not currently banned).
    pub banned_at: Option<Instant>,
    /// Total penalty points received over the lifetime of this record.
    pub total_penalties: u64,
    /// Total bonus points received over the lifetime of this record.
    pub total_bonuses: u64,
}

impl PeerScore {
    fn new() -> Self {
        Self {
            score: 0,
            banned_at: None,
            total_penalties: 0,
            total_bonuses: 0,
        }
    }
}

/// Manages peer scores for all known peers.
///
/// # Usage
///
/// Call [`PeerScoreBoard::penalize`] when a peer misbehaves and
/// [`PeerScoreBoard::reward`] when a peer does something useful. Poll
/// [`PeerScoreBoard::is_banned`] before accepting work from a peer, and call
/// [`PeerScoreBoard::unban_expired`] periodically to lift expired bans.
pub struct PeerScoreBoard {
    scores: HashMap<PeerId, PeerScore>,
}

impl PeerScoreBoard {
    /// Create an empty score board.
    pub fn new() -> Self {
        Self {
            scores: HashMap::new(),
        }
    }

    /// Apply a penalty (negative value) to a peer.
    ///
    /// Returns `true` if this penalty caused the peer to be banned (i.e. the
    /// peer crossed [`BAN_THRESHOLD`] with this call and was not already
    /// banned).
    pub fn penalize(&mut self, peer: &PeerId, penalty: i64) -> bool {
        let entry = self.scores.entry(*peer).or_insert_with(PeerScore::new);

        // Only penalise peers that are not already banned.
        if entry.banned_at.is_some() {
            debug!(%peer, "peer_score: skipping penalty for already-banned peer");
            return false;
        }

        entry.score = entry.score.saturating_add(penalty);
        entry.total_penalties = entry.total_penalties.saturating_add(penalty.unsigned_abs());

        debug!(%peer, score = entry.score, penalty, "peer_score: penalty applied");

        // Check if we just crossed the ban threshold.
        if entry.score <= BAN_THRESHOLD {
            entry.banned_at = Some(Instant::now());
            warn!(%peer, score = entry.score, "peer_score: peer banned");
            return true;
        }

        false
    }

    /// Apply a bonus (positive value) to a peer's score, capped at [`MAX_SCORE`].
    pub fn reward(&mut self, peer: &PeerId, bonus: i64) {
        let entry = self.scores.entry(*peer).or_insert_with(PeerScore::new);

        entry.score = entry.score.saturating_add(bonus).min(MAX_SCORE);
        entry.total_bonuses = entry.total_bonuses.saturating_add(bonus.unsigned_abs());

        debug!(%peer, score = entry.score, bonus, "peer_score: bonus applied");
    }

    /// Returns `true` if the peer is currently banned (and the ban has not yet
    /// expired).
    pub fn is_banned(&self, peer: &PeerId) -> bool {
        match self.scores.get(peer) {
            Some(ps) => match ps.banned_at {
                Some(banned_at) => banned_at.elapsed() < BAN_DURATION,
                None => false,
            },
            None => false,
        }
    }

    /// Returns the peer's current score, or `0` if the peer is unknown.
    pub fn score(&self, peer: &PeerId) -> i64 {
        self.scores.get(peer).map(|ps| ps.score).unwrap_or(0)
    }

    /// Lift all bans whose [`BAN_DURATION`] has elapsed.
    ///
    /// Resets the score of each unbanned peer to `0` and returns the list of
    /// peers whose bans were lifted so callers can reconnect them if desired.
    pub fn unban_expired(&mut self) -> Vec<PeerId> {
        let mut unbanned = Vec::new();

        for (peer, ps) in self.scores.iter_mut() {
            if let Some(banned_at) = ps.banned_at {
                if banned_at.elapsed() >= BAN_DURATION {
                    ps.banned_at = None;
                    ps.score = 0;
                    unbanned.push(*peer);
                    info!(%peer, "peer_score: ban expired, peer unbanned");
                }
            }
        }

        unbanned
    }

    /// Remove all tracking data for a peer (call on disconnect).
    pub fn remove_peer(&mut self, peer: &PeerId) {
        if self.scores.remove(peer).is_some() {
            debug!(%peer, "peer_score: peer removed from score board");
        }
    }

    /// Returns the [`PeerId`]s of all currently banned peers.
    pub fn banned_peers(&self) -> Vec<PeerId> {
        self.scores
            .iter()
            .filter(|(_, ps)| {
                ps.banned_at
                    .map(|t| t.elapsed() < BAN_DURATION)
                    .unwrap_or(false)
            })
            .map(|(id, _)| *id)
            .collect()
    }

    /// Returns a snapshot of the score record for a peer, or `None` if the
    /// peer is unknown.
    pub fn peer_info(&self, peer: &PeerId) -> Option<PeerScore> {
        self.scores.get(peer).cloned()
    }
}

impl Default for PeerScoreBoard {
    fn default() -> Self {
        Self::new()
    }
}
