//! Public API: the tracker facade and its configuration, stats, and
//! snapshots.

pub mod config;
pub mod shared;
pub mod snapshot;
pub mod stats;
pub mod tracker;
