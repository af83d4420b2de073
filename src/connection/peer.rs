//! A single peer connection and its teardown routine

use super::options::ConnectionOptions;
use super::state::PeerState;
use crate::bond::{BondCallbacks, BondFactory, BondSpec, LivenessBond};
use crate::error::ConnectionError;
use crate::registry::RegistryShared;
use crate::relay::CallbackRelay;
use crate::source::{BridgeOptions, EventSource, LaunchSpec};
use parking_lot::Mutex;
use rtcbond_shared::{
    BondError, ConnectionKey, ConnectionState, LifecycleEvent, LifecycleMachine, PeerEvent,
    PeerId, SessionId, TeardownTrigger,
};
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// Owner reference and lifecycle state, guarded together so that clearing
/// the owner and leaving the live states happen as one step.
struct Lifecycle {
    owner: Option<Weak<RegistryShared>>,
    machine: LifecycleMachine,
}

struct BridgeBond {
    label: String,
    bond: Arc<dyn LivenessBond>,
}

/// A connection to one remote peer, owned by a `Registry`
pub struct Connection {
    key: ConnectionKey,
    namespace: Option<String>,
    this: Weak<Connection>,
    source: Arc<dyn EventSource>,
    bonds: Arc<dyn BondFactory>,
    lifecycle: Mutex<Lifecycle>,
    primary_bond: Mutex<Option<Arc<dyn LivenessBond>>>,
    secondary_bonds: Mutex<Vec<BridgeBond>>,
    relay: Mutex<Option<Arc<CallbackRelay>>>,
    peer: Mutex<PeerState>,
}

impl Connection {
    /// Build a connection in `Initializing` state with its relay attached.
    /// `options` must already carry the registry defaults.
    pub(crate) fn new(
        key: ConnectionKey,
        options: &ConnectionOptions,
        source: Arc<dyn EventSource>,
        bonds: Arc<dyn BondFactory>,
        owner: &Arc<RegistryShared>,
    ) -> Arc<Self> {
        let connection = Arc::new_cyclic(|this: &Weak<Connection>| {
            let primary_bond = if options.bonding_enabled() {
                let (formed, broken) = (this.clone(), this.clone());
                let callbacks = BondCallbacks::new(
                    move || {
                        if let Some(connection) = formed.upgrade() {
                            connection.on_bond_formed();
                        }
                    },
                    move || {
                        if let Some(connection) = broken.upgrade() {
                            connection.on_bond_broken();
                        }
                    },
                );
                let bond = bonds.bond(
                    BondSpec::new(key.bond_id(options.namespace.as_deref())),
                    callbacks,
                );
                if let Some(timeout) = options.bond_timeout {
                    bond.set_heartbeat_timeout(timeout);
                }
                Some(bond)
            } else {
                info!("[PC] {} bonding disabled", key);
                None
            };

            let relay = Arc::new(CallbackRelay::new(
                Arc::downgrade(owner),
                this.clone(),
                &source,
            ));

            Connection {
                key,
                namespace: options.namespace.clone(),
                this: this.clone(),
                source,
                bonds,
                lifecycle: Mutex::new(Lifecycle {
                    owner: Some(Arc::downgrade(owner)),
                    machine: LifecycleMachine::new(),
                }),
                primary_bond: Mutex::new(primary_bond),
                secondary_bonds: Mutex::new(Vec::new()),
                relay: Mutex::new(Some(relay)),
                peer: Mutex::new(PeerState::default()),
            }
        });

        let relay = connection.relay.lock().clone();
        if let Some(relay) = relay {
            relay.attach();
        }
        connection
    }

    /// Start the primary bond (if any) and become `Active`.
    /// Called once the connection is registered.
    pub(crate) fn activate(&self) -> Result<(), BondError> {
        let primary = self.primary_bond.lock().clone();
        if let Some(bond) = primary {
            bond.start()?;
        }

        let result = self.lifecycle.lock().machine.process_event(LifecycleEvent::Activated);
        if !result.is_success() {
            debug!("[PC] {} not activated: {:?}", self, result);
        }
        Ok(())
    }

    pub fn key(&self) -> &ConnectionKey {
        &self.key
    }

    pub fn session_id(&self) -> &SessionId {
        &self.key.session_id
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.key.peer_id
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn state(&self) -> ConnectionState {
        self.lifecycle.lock().machine.state()
    }

    /// False once teardown has started
    pub fn is_live(&self) -> bool {
        self.lifecycle.lock().owner.is_some()
    }

    /// What started teardown, if it has started
    pub fn teardown_trigger(&self) -> Option<TeardownTrigger> {
        self.lifecycle.lock().machine.trigger().cloned()
    }

    pub fn source(&self) -> &Arc<dyn EventSource> {
        &self.source
    }

    pub fn primary_bond(&self) -> Option<Arc<dyn LivenessBond>> {
        self.primary_bond.lock().clone()
    }

    pub fn has_primary_bond(&self) -> bool {
        self.primary_bond.lock().is_some()
    }

    pub fn secondary_bond_count(&self) -> usize {
        self.secondary_bonds.lock().len()
    }

    /// Labels of open bridges, in the order they were opened
    pub fn bridge_labels(&self) -> Vec<String> {
        self.secondary_bonds
            .lock()
            .iter()
            .map(|bridge| bridge.label.clone())
            .collect()
    }

    fn has_bridge(&self, label: &str) -> bool {
        self.secondary_bonds
            .lock()
            .iter()
            .any(|bridge| bridge.label == label)
    }

    fn duplicate_bridge(&self, label: &str) -> ConnectionError {
        ConnectionError::DuplicateBridge {
            key: self.key.clone(),
            label: label.to_string(),
        }
    }

    /// Snapshot of what default handling has recorded so far
    pub fn peer_state(&self) -> PeerState {
        self.peer.lock().clone()
    }

    /// Open a data channel bridged to a launched process and supervise it
    /// with a secondary bond. Failure of that bond deletes the whole connection.
    ///
    /// Returns `Ok(None)` if the event source declines to open the bridge.
    /// Labels are unique per connection.
    pub fn open_bridge(
        &self,
        label: &str,
        launch: &LaunchSpec,
        options: &BridgeOptions,
    ) -> Result<Option<Arc<dyn LivenessBond>>, ConnectionError> {
        if !self.is_live() {
            return Err(ConnectionError::Deleted {
                key: self.key.clone(),
            });
        }
        if self.has_bridge(label) {
            return Err(self.duplicate_bridge(label));
        }

        let handle = match self.source.open_bridge(label, launch, options)? {
            Some(handle) => handle,
            None => {
                info!("[PC] {} bridge \"{}\" refused", self, label);
                return Ok(None);
            }
        };

        let spec = BondSpec {
            id: handle.bond_id,
            heartbeat_timeout: Some(options.timeout),
            heartbeat_period: options.heartbeat,
        };
        let bond = self.bonds.bond(spec, self.bridge_callbacks(label));

        {
            let mut secondary = self.secondary_bonds.lock();
            let rejected = if !self.lifecycle.lock().machine.is_live() {
                Some(ConnectionError::Deleted {
                    key: self.key.clone(),
                })
            } else if secondary.iter().any(|bridge| bridge.label == label) {
                Some(self.duplicate_bridge(label))
            } else {
                secondary.push(BridgeBond {
                    label: label.to_string(),
                    bond: bond.clone(),
                });
                None
            };
            drop(secondary);

            if let Some(err) = rejected {
                if let Err(err) = bond.shutdown() {
                    warn!("[PC] {} bridge \"{}\" bond shutdown failed: {}", self, label, err);
                }
                return Err(err);
            }
        }

        if let Err(err) = bond.start() {
            warn!("[PC] {} bridge \"{}\" bond failed to start: {}", self, label, err);
            self.secondary_bonds
                .lock()
                .retain(|bridge| !Arc::ptr_eq(&bridge.bond, &bond));
            if let Err(err) = bond.shutdown() {
                warn!("[PC] {} bridge \"{}\" bond shutdown failed: {}", self, label, err);
            }
            return Err(err.into());
        }

        info!("[PC] {} bridge \"{}\" opened", self, label);
        Ok(Some(bond))
    }

    /// Tear the connection down. Safe to call any number of times from any trigger.
    pub fn delete(&self) {
        self.teardown(TeardownTrigger::Explicit);
    }

    /// The single teardown routine. Each stage runs even if an earlier one fails.
    pub(crate) fn teardown(&self, trigger: TeardownTrigger) {
        // Clearing the owner is the idempotency guard
        let owner = {
            let mut lifecycle = self.lifecycle.lock();
            match lifecycle.owner.take() {
                Some(owner) => {
                    lifecycle
                        .machine
                        .process_event(LifecycleEvent::TeardownStarted(trigger.clone()));
                    owner
                }
                None => {
                    debug!("[PC] {} already deleting, ignoring {}", self, trigger);
                    return;
                }
            }
        };

        info!("[PC] {} deleting ({}) ...", self, trigger);
        let registry = owner.upgrade();

        if let Some(registry) = &registry {
            registry.handler.on_connection_deleted(self);
        }

        let primary = self.primary_bond.lock().take();
        if let Some(bond) = primary {
            if let Err(err) = bond.shutdown() {
                warn!("[PC] {} bond shutdown failed: {}", self, err);
            }
        }

        let secondary = std::mem::take(&mut *self.secondary_bonds.lock());
        for bridge in secondary {
            if let Err(err) = bridge.bond.shutdown() {
                warn!(
                    "[PC] {} bridge \"{}\" bond shutdown failed: {}",
                    self, bridge.label, err
                );
            }
        }

        let relay = self.relay.lock().take();
        if let Some(relay) = relay {
            relay.shutdown();
        }

        if let Err(err) = self.source.close() {
            warn!("[PC] {} close cmd failed - {}", self, err);
        }

        if let Some(registry) = &registry {
            if !registry.release(self) {
                debug!("[PC] {} already replaced in registry", self);
            }
        }

        self.lifecycle
            .lock()
            .machine
            .process_event(LifecycleEvent::TeardownFinished);
        info!("[PC] {} deleted", self);
    }

    /// Default handling of a relayed event
    pub(crate) fn handle_event(&self, event: &PeerEvent) {
        debug!("[PC] {} {}", self, event.kind());
        self.peer.lock().apply(event);
    }

    fn on_bond_broken(&self) {
        info!("[PC] {} bond broken, deleting pc ...", self);
        self.teardown(TeardownTrigger::PrimaryBondBroken);
    }

    fn on_bond_formed(&self) {
        info!("[PC] {} bond formed", self);
    }

    fn on_bridge_bond_broken(&self, label: &str) {
        info!("[PC] {} bridge \"{}\" bond broken, deleting pc ...", self, label);
        self.teardown(TeardownTrigger::BridgeBondBroken {
            label: label.to_string(),
        });
    }

    fn on_bridge_bond_formed(&self, label: &str) {
        info!("[PC] {} bridge \"{}\" bond formed", self, label);
    }

    fn bridge_callbacks(&self, label: &str) -> BondCallbacks {
        let (formed, broken) = (self.this.clone(), self.this.clone());
        let (formed_label, broken_label) = (label.to_string(), label.to_string());
        BondCallbacks::new(
            move || {
                if let Some(connection) = formed.upgrade() {
                    connection.on_bridge_bond_formed(&formed_label);
                }
            },
            move || {
                if let Some(connection) = broken.upgrade() {
                    connection.on_bridge_bond_broken(&broken_label);
                }
            },
        )
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}({})", self.key, ns),
            None => write!(f, "{}", self.key),
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("key", &self.key)
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}
