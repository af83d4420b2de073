//! Liveness bonds
//!
//! A bond is a heartbeat channel between two endpoints. It reports `formed`
//! once the remote side is observed and `broken` when heartbeats stop. This
//! module holds:
//! - The `LivenessBond` / `BondFactory` seam the connection core drives
//! - `HeartbeatBond`, an in-process timer bond on the tokio runtime

mod heartbeat;
mod traits;

pub use heartbeat::{HeartbeatBond, HeartbeatBondFactory, HeartbeatConfig};
pub use traits::{BondCallbacks, BondFactory, BondSpec, LivenessBond};
