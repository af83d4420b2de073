//! Heartbeat Bond
//!
//! Runs a background ticker that emits local heartbeats and watches for
//! remote ones, firing `formed` on the first remote heartbeat and `broken`
//! when the remote side goes quiet for longer than the heartbeat timeout.

use super::traits::{BondCallbacks, BondFactory, BondSpec, LivenessBond};
use parking_lot::Mutex;
use rtcbond_shared::{liveness, BondError, BondHeartbeat};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Timing defaults for heartbeat bonds
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// Silence after which the bond is considered broken
    pub heartbeat_timeout: Duration,
    /// Interval between local heartbeats and liveness checks
    pub heartbeat_period: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout: Duration::from_millis(liveness::HEARTBEAT_TIMEOUT_MS),
            heartbeat_period: Duration::from_millis(liveness::HEARTBEAT_PERIOD_MS),
        }
    }
}

/// State shared between a bond handle, its ticker task and the factory
struct BondState {
    id: String,
    timeout: Mutex<Duration>,
    period: Duration,
    last_seen: Mutex<Option<Instant>>,
    formed: AtomicBool,
    broken: AtomicBool,
    stopped: AtomicBool,
    sequence_id: AtomicU64,
    callbacks: BondCallbacks,
    outbound: Option<mpsc::UnboundedSender<BondHeartbeat>>,
}

impl BondState {
    fn observe(&self) {
        *self.last_seen.lock() = Some(Instant::now());
    }

    fn send_heartbeat(&self) {
        if let Some(tx) = &self.outbound {
            let seq = self.sequence_id.fetch_add(1, Ordering::SeqCst) + 1;
            if tx.send(BondHeartbeat::new(self.id.clone(), seq)).is_err() {
                debug!("[BOND] {} outbound heartbeat channel closed", self.id);
            }
        }
    }

    /// Run one liveness check. Returns false once the bond is broken.
    fn check(&self, started_at: Instant) -> bool {
        let last_seen = *self.last_seen.lock();
        let stopped = || self.stopped.load(Ordering::SeqCst);

        if last_seen.is_some() && !stopped() && !self.formed.swap(true, Ordering::SeqCst) {
            info!("[BOND] {} formed", self.id);
            self.callbacks.formed();
        }

        let timeout = *self.timeout.lock();
        let silent_for = last_seen.unwrap_or(started_at).elapsed();
        if silent_for <= timeout {
            return true;
        }

        if !stopped() && !self.broken.swap(true, Ordering::SeqCst) {
            warn!(
                "[BOND] {} broken: no heartbeat for {:?} (timeout {:?})",
                self.id, silent_for, timeout
            );
            self.callbacks.broken();
        }
        false
    }
}

/// In-process heartbeat bond driven by a tokio task
pub struct HeartbeatBond {
    state: Arc<BondState>,
    started: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HeartbeatBond {
    /// Create a bond; it does nothing until `start` is called
    pub fn new(
        spec: BondSpec,
        config: &HeartbeatConfig,
        callbacks: BondCallbacks,
        outbound: Option<mpsc::UnboundedSender<BondHeartbeat>>,
    ) -> Self {
        let state = BondState {
            timeout: Mutex::new(spec.heartbeat_timeout.unwrap_or(config.heartbeat_timeout)),
            period: spec.heartbeat_period.unwrap_or(config.heartbeat_period),
            id: spec.id,
            last_seen: Mutex::new(None),
            formed: AtomicBool::new(false),
            broken: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            sequence_id: AtomicU64::new(0),
            callbacks,
            outbound,
        };

        Self {
            state: Arc::new(state),
            started: AtomicBool::new(false),
            task: Mutex::new(None),
        }
    }

    /// Record a heartbeat from the remote side
    pub fn observe(&self) {
        self.state.observe();
    }

    pub fn is_formed(&self) -> bool {
        self.state.formed.load(Ordering::SeqCst)
    }

    pub fn is_broken(&self) -> bool {
        self.state.broken.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        self.state.stopped.store(true, Ordering::SeqCst);
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }
}

impl LivenessBond for HeartbeatBond {
    fn id(&self) -> &str {
        &self.state.id
    }

    fn start(&self) -> Result<(), BondError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| BondError::NoRuntime)?;
        // tokio's interval panics on a zero period
        if self.state.period.is_zero() {
            warn!("[BOND] {} rejected: zero heartbeat period", self.state.id);
            return Err(BondError::ZeroPeriod(self.state.id.clone()));
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(BondError::AlreadyStarted(self.state.id.clone()));
        }

        let state = self.state.clone();
        let handle = runtime.spawn(async move {
            let mut ticker = interval(state.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let started_at = Instant::now();

            loop {
                ticker.tick().await;

                if state.stopped.load(Ordering::SeqCst) {
                    break;
                }

                state.send_heartbeat();

                if !state.check(started_at) {
                    break;
                }
            }

            debug!("[BOND] {} monitoring stopped", state.id);
        });

        *self.task.lock() = Some(handle);
        debug!("[BOND] {} started", self.state.id);
        Ok(())
    }

    fn shutdown(&self) -> Result<(), BondError> {
        self.stop();
        debug!("[BOND] {} shut down", self.state.id);
        Ok(())
    }

    fn heartbeat_timeout(&self) -> Duration {
        *self.state.timeout.lock()
    }

    fn set_heartbeat_timeout(&self, timeout: Duration) {
        *self.state.timeout.lock() = timeout;
    }
}

impl Drop for HeartbeatBond {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Builds heartbeat bonds and routes remote heartbeats to them by id
pub struct HeartbeatBondFactory {
    config: HeartbeatConfig,
    outbound: Option<mpsc::UnboundedSender<BondHeartbeat>>,
    bonds: Mutex<HashMap<String, Weak<BondState>>>,
}

impl HeartbeatBondFactory {
    pub fn new(config: HeartbeatConfig) -> Self {
        Self {
            config,
            outbound: None,
            bonds: Mutex::new(HashMap::new()),
        }
    }

    /// Emit every local heartbeat on `tx`
    pub fn with_outbound(mut self, tx: mpsc::UnboundedSender<BondHeartbeat>) -> Self {
        self.outbound = Some(tx);
        self
    }

    pub fn config(&self) -> &HeartbeatConfig {
        &self.config
    }

    /// Record a remote heartbeat for `bond_id`. Returns false if no live bond has that id.
    pub fn observe(&self, bond_id: &str) -> bool {
        let mut bonds = self.bonds.lock();
        match bonds.get(bond_id).and_then(Weak::upgrade) {
            Some(state) => {
                state.observe();
                true
            }
            None => {
                bonds.remove(bond_id);
                false
            }
        }
    }

    /// Number of bonds still alive
    pub fn live_bonds(&self) -> usize {
        self.bonds
            .lock()
            .values()
            .filter(|state| state.strong_count() > 0)
            .count()
    }
}

impl Default for HeartbeatBondFactory {
    fn default() -> Self {
        Self::new(HeartbeatConfig::default())
    }
}

impl BondFactory for HeartbeatBondFactory {
    fn bond(&self, spec: BondSpec, callbacks: BondCallbacks) -> Arc<dyn LivenessBond> {
        let bond = HeartbeatBond::new(spec, &self.config, callbacks, self.outbound.clone());

        let mut bonds = self.bonds.lock();
        bonds.retain(|_, state| state.strong_count() > 0);
        bonds.insert(bond.state.id.clone(), Arc::downgrade(&bond.state));

        Arc::new(bond)
    }
}
