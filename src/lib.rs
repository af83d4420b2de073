//! rtcbond
//!
//! Lifecycle management for bidirectional real-time connections to remote
//! peers, each identified by a (session, peer) pair:
//! - `registry`: creates, looks up, replaces and destroys connections
//! - `connection`: per-connection state machine and the single teardown routine
//! - `relay`: routes event source events to application hooks, then to default handling
//! - `bond`: heartbeat liveness supervision
//! - `source`: the signaling/media event source seam

pub mod bond;
pub mod connection;
pub mod error;
pub mod registry;
pub mod relay;
pub mod source;

#[cfg(test)]
pub(crate) mod testutil;

pub use connection::{Connection, ConnectionOptions, PeerState};
pub use error::{ConnectionError, RegistryError};
pub use registry::{NoopHandler, Registry, RegistryConfig, RegistryHandler, ServerHandle};
pub use rtcbond_shared as shared;
