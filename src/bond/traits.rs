//! Bond trait abstraction for pluggable liveness backends

use rtcbond_shared::BondError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

type Callback = Arc<dyn Fn() + Send + Sync>;

/// Callbacks a bond fires as the remote side appears and disappears
#[derive(Clone)]
pub struct BondCallbacks {
    on_formed: Callback,
    on_broken: Callback,
}

impl BondCallbacks {
    pub fn new(
        on_formed: impl Fn() + Send + Sync + 'static,
        on_broken: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        Self {
            on_formed: Arc::new(on_formed),
            on_broken: Arc::new(on_broken),
        }
    }

    /// Callbacks that do nothing
    pub fn noop() -> Self {
        Self::new(|| {}, || {})
    }

    pub fn formed(&self) {
        (self.on_formed)()
    }

    pub fn broken(&self) {
        (self.on_broken)()
    }
}

impl fmt::Debug for BondCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BondCallbacks").finish_non_exhaustive()
    }
}

/// What a factory needs to build one bond
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BondSpec {
    /// Identifier shared by both ends of the bond
    pub id: String,
    /// Overrides the factory's default heartbeat timeout
    pub heartbeat_timeout: Option<Duration>,
    /// Overrides the factory's default heartbeat period
    pub heartbeat_period: Option<Duration>,
}

impl BondSpec {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            heartbeat_timeout: None,
            heartbeat_period: None,
        }
    }
}

/// A heartbeat channel supervising one connection or bridge
pub trait LivenessBond: Send + Sync {
    /// Bond identifier
    fn id(&self) -> &str;

    /// Begin exchanging heartbeats
    fn start(&self) -> Result<(), BondError>;

    /// Stop exchanging heartbeats; no callback fires afterwards
    fn shutdown(&self) -> Result<(), BondError>;

    fn heartbeat_timeout(&self) -> Duration;

    fn set_heartbeat_timeout(&self, timeout: Duration);
}

/// Factory for creating bonds
pub trait BondFactory: Send + Sync {
    fn bond(&self, spec: BondSpec, callbacks: BondCallbacks) -> Arc<dyn LivenessBond>;
}
