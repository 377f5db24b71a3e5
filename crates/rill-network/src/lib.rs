//! # rill-network — peer block-download scheduling.
//!
//! Tracks per-peer synchronization state and decides which blocks to
//! request from which peer during header-first initial block download,
//! following the same scheduling discipline as Bitcoin/Divi's
//! `FindNextBlocksToDownload`: a bounded sliding window past each peer's
//! last common block with this node, batched ancestor resolution, and
//! stall attribution when a peer is blocking the window with in-flight
//! requests nobody has answered.
//!
//! This crate does not speak the wire protocol — peer discovery, transport,
//! and message framing live elsewhere. [`DownloadScheduler`] is the single
//! entry point an embedding node talks to; everything else here is its
//! implementation.

pub mod availability;
pub mod collaborators;
pub mod config;
pub mod in_flight;
pub mod peer_scoring;
pub mod peer_state;
pub mod planner;
pub mod registry;
pub mod scheduler;

pub use config::SchedulerConfig;
pub use peer_scoring::{BAN_DURATION, BAN_THRESHOLD, PeerScore, PeerScoreBoard};
pub use peer_state::{ConnectInfo, ConnectionFlags, PeerState, QueuedBlock};
pub use planner::PlanResult;
pub use registry::PeerRegistry;
pub use scheduler::DownloadScheduler;
