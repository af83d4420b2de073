//! rtcbond Shared Types
//!
//! This crate provides the identifiers, peer connection events, lifecycle
//! state machine and collaborator errors shared by the connection registry
//! and the collaborators it drives.

pub mod error;
pub mod events;
pub mod ids;
pub mod state_machine;

use std::time::{SystemTime, UNIX_EPOCH};

pub use error::{BondError, SourceError, TransportError};
pub use events::{
    DataChannel, IceCandidate, IceConnectionState, MediaStream, PeerEvent, SdpType,
    SessionDescription, SignalingState,
};
pub use ids::{ConnectionKey, PeerId, SessionId};
pub use state_machine::{
    ConnectionState, LifecycleEvent, LifecycleMachine, TeardownTrigger, TransitionResult,
};

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Liveness parameters for bonds
pub mod liveness {
    /// Interval between heartbeats sent on a bond
    pub const HEARTBEAT_PERIOD_MS: u64 = 1000;

    /// A bond is broken when no heartbeat arrives within this window
    pub const HEARTBEAT_TIMEOUT_MS: u64 = 4000;

    /// Default heartbeat timeout for bridge (secondary) bonds
    pub const BRIDGE_TIMEOUT_MS: u64 = 5000;
}

/// A single heartbeat emitted on a bond
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BondHeartbeat {
    pub bond_id: String,
    pub sequence_id: u64,
    pub timestamp_ms: u64,
}

impl BondHeartbeat {
    /// Create a heartbeat stamped with the current time
    pub fn new(bond_id: impl Into<String>, sequence_id: u64) -> Self {
        Self {
            bond_id: bond_id.into(),
            sequence_id,
            timestamp_ms: now_ms(),
        }
    }
}
