//! Event source trait abstraction for pluggable signaling backends

use rtcbond_shared::{liveness, ConnectionKey, PeerEvent, SourceError, TransportError};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Construction options handed to the source factory unexamined
pub type SourceOptions = BTreeMap<String, String>;

/// Receiver of the events an event source emits
pub trait EventSink: Send + Sync {
    fn deliver(&self, event: PeerEvent);
}

/// Process to launch at the far end of a bridge
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
}

impl LaunchSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// Bridge bond timing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeOptions {
    /// Heartbeat timeout of the bridge bond
    pub timeout: Duration,
    /// Heartbeat period of the bridge bond (bond default if unset)
    pub heartbeat: Option<Duration>,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(liveness::BRIDGE_TIMEOUT_MS),
            heartbeat: None,
        }
    }
}

/// A bridge the event source agreed to open
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeHandle {
    pub label: String,
    /// Id of the bond supervising the bridged process
    pub bond_id: String,
}

/// The signaling/media object behind one connection
pub trait EventSource: Send + Sync {
    /// Route all future events to `sink`
    fn attach(&self, sink: Arc<dyn EventSink>);

    /// Stop routing events
    fn detach(&self);

    /// Open a data channel bridged to a launched process.
    /// `Ok(None)` means the source declined.
    fn open_bridge(
        &self,
        label: &str,
        launch: &LaunchSpec,
        options: &BridgeOptions,
    ) -> Result<Option<BridgeHandle>, SourceError>;

    /// Close the underlying transport
    fn close(&self) -> Result<(), TransportError>;
}

/// Factory for creating event sources
pub trait SourceFactory: Send + Sync {
    fn create(
        &self,
        key: &ConnectionKey,
        namespace: Option<&str>,
        options: &SourceOptions,
    ) -> Result<Arc<dyn EventSource>, SourceError>;
}
