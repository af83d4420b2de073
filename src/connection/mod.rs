//! Peer connections
//!
//! This module handles:
//! - Connection construction and primary bond supervision
//! - Bridged sub-channels, each supervised by a secondary bond
//! - The single, idempotent teardown routine every trigger funnels into
//! - Default bookkeeping of relayed peer events

mod options;
mod peer;
mod state;

pub use options::ConnectionOptions;
pub use peer::Connection;
pub use state::PeerState;
