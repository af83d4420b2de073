//! Recording fakes shared by the unit tests

use crate::bond::{BondCallbacks, BondFactory, BondSpec, LivenessBond};
use crate::source::{
    BridgeHandle, BridgeOptions, EventSink, EventSource, LaunchSpec, SourceFactory, SourceOptions,
};
use crate::{Connection, NoopHandler, Registry, RegistryConfig, RegistryHandler};
use parking_lot::Mutex;
use rtcbond_shared::{
    liveness, BondError, ConnectionKey, ConnectionState, DataChannel, IceCandidate,
    IceConnectionState, MediaStream, PeerEvent, SessionDescription, SignalingState, SourceError,
    TransportError,
};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Ordered log of side effects across all fakes
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

pub struct MockBond {
    spec: BondSpec,
    callbacks: BondCallbacks,
    timeout: Mutex<Duration>,
    starts: AtomicU32,
    shutdowns: AtomicU32,
    stopped: AtomicBool,
    fail_start: bool,
    fail_shutdown: bool,
    late_callbacks: bool,
    journal: Journal,
}

impl MockBond {
    pub fn spec(&self) -> BondSpec {
        self.spec.clone()
    }

    pub fn starts(&self) -> u32 {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> u32 {
        self.shutdowns.load(Ordering::SeqCst)
    }

    fn silenced(&self) -> bool {
        self.stopped.load(Ordering::SeqCst) && !self.late_callbacks
    }

    /// Simulate the remote side going quiet
    pub fn fire_broken(&self) {
        if !self.silenced() {
            self.callbacks.broken();
        }
    }

    pub fn fire_formed(&self) {
        if !self.silenced() {
            self.callbacks.formed();
        }
    }
}

impl LivenessBond for MockBond {
    fn id(&self) -> &str {
        &self.spec.id
    }

    fn start(&self) -> Result<(), BondError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.journal.push(format!("bond started {}", self.spec.id));
        if self.fail_start {
            return Err(BondError::NoRuntime);
        }
        Ok(())
    }

    fn shutdown(&self) -> Result<(), BondError> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        self.stopped.store(true, Ordering::SeqCst);
        self.journal.push(format!("bond shutdown {}", self.spec.id));
        if self.fail_shutdown {
            return Err(BondError::ShutdownFailed {
                reason: "injected".into(),
            });
        }
        Ok(())
    }

    fn heartbeat_timeout(&self) -> Duration {
        *self.timeout.lock()
    }

    fn set_heartbeat_timeout(&self, timeout: Duration) {
        *self.timeout.lock() = timeout;
    }
}

#[derive(Default)]
pub struct MockBondFactory {
    bonds: Mutex<Vec<Arc<MockBond>>>,
    fail_starts: AtomicBool,
    fail_shutdowns: AtomicBool,
    late_callbacks: AtomicBool,
    journal: Journal,
}

impl MockBondFactory {
    /// Most recent bond built with `id`
    pub fn latest(&self, id: &str) -> Option<Arc<MockBond>> {
        self.bonds.lock().iter().rev().find(|bond| bond.spec.id == id).cloned()
    }

    pub fn created(&self) -> Vec<Arc<MockBond>> {
        self.bonds.lock().clone()
    }

    pub fn fail_starts(&self) {
        self.fail_starts.store(true, Ordering::SeqCst);
    }

    pub fn fail_shutdowns(&self) {
        self.fail_shutdowns.store(true, Ordering::SeqCst);
    }

    /// Bonds built from now on keep firing callbacks after shutdown,
    /// like a timer tick already in flight
    pub fn late_callbacks(&self) {
        self.late_callbacks.store(true, Ordering::SeqCst);
    }
}

impl BondFactory for MockBondFactory {
    fn bond(&self, spec: BondSpec, callbacks: BondCallbacks) -> Arc<dyn LivenessBond> {
        self.journal.push(format!("bond created {}", spec.id));
        let timeout = spec
            .heartbeat_timeout
            .unwrap_or(Duration::from_millis(liveness::HEARTBEAT_TIMEOUT_MS));
        let bond = Arc::new(MockBond {
            spec,
            callbacks,
            timeout: Mutex::new(timeout),
            starts: AtomicU32::new(0),
            shutdowns: AtomicU32::new(0),
            stopped: AtomicBool::new(false),
            fail_start: self.fail_starts.load(Ordering::SeqCst),
            fail_shutdown: self.fail_shutdowns.load(Ordering::SeqCst),
            late_callbacks: self.late_callbacks.load(Ordering::SeqCst),
            journal: self.journal.clone(),
        });
        self.bonds.lock().push(bond.clone());
        bond
    }
}

type Hook = Arc<dyn Fn() + Send + Sync>;

pub struct MockSource {
    key: ConnectionKey,
    namespace: Option<String>,
    options: SourceOptions,
    sink: Mutex<Option<Arc<dyn EventSink>>>,
    closes: AtomicU32,
    fail_close: AtomicBool,
    refuse_bridges: AtomicBool,
    bridges: AtomicU32,
    on_close: Mutex<Option<Hook>>,
    journal: Journal,
}

impl MockSource {
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn options(&self) -> &SourceOptions {
        &self.options
    }

    pub fn closes(&self) -> u32 {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn fail_close(&self) {
        self.fail_close.store(true, Ordering::SeqCst);
    }

    pub fn refuse_bridges(&self) {
        self.refuse_bridges.store(true, Ordering::SeqCst);
    }

    /// Bridges the source agreed to open
    pub fn bridges(&self) -> u32 {
        self.bridges.load(Ordering::SeqCst)
    }

    /// Run `hook` while the transport is being closed
    pub fn on_close(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.on_close.lock() = Some(Arc::new(hook));
    }

    pub fn sink(&self) -> Option<Arc<dyn EventSink>> {
        self.sink.lock().clone()
    }

    pub fn is_attached(&self) -> bool {
        self.sink.lock().is_some()
    }

    /// Deliver `event` to the attached sink. Returns false if nothing is attached.
    pub fn emit(&self, event: PeerEvent) -> bool {
        match self.sink() {
            Some(sink) => {
                sink.deliver(event);
                true
            }
            None => false,
        }
    }
}

impl EventSource for MockSource {
    fn attach(&self, sink: Arc<dyn EventSink>) {
        *self.sink.lock() = Some(sink);
    }

    fn detach(&self) {
        self.sink.lock().take();
    }

    fn open_bridge(
        &self,
        label: &str,
        _launch: &LaunchSpec,
        _options: &BridgeOptions,
    ) -> Result<Option<BridgeHandle>, SourceError> {
        if self.refuse_bridges.load(Ordering::SeqCst) {
            return Ok(None);
        }
        self.bridges.fetch_add(1, Ordering::SeqCst);
        Ok(Some(BridgeHandle {
            label: label.to_string(),
            bond_id: format!("{}/{}", self.key.bond_id(self.namespace()), label),
        }))
    }

    fn close(&self) -> Result<(), TransportError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.journal.push(format!("source closed {}", self.key));
        let hook = self.on_close.lock().clone();
        if let Some(hook) = hook {
            hook();
        }
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(TransportError::CloseFailed {
                reason: "injected".into(),
            });
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MockSourceFactory {
    sources: Mutex<Vec<Arc<MockSource>>>,
    fail_next: AtomicBool,
    journal: Journal,
}

impl MockSourceFactory {
    pub fn latest(&self, session_id: &str, peer_id: &str) -> Option<Arc<MockSource>> {
        let key = ConnectionKey::new(session_id, peer_id);
        self.sources.lock().iter().rev().find(|source| source.key == key).cloned()
    }

    /// Make the next `create` fail
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

impl SourceFactory for MockSourceFactory {
    fn create(
        &self,
        key: &ConnectionKey,
        namespace: Option<&str>,
        options: &SourceOptions,
    ) -> Result<Arc<dyn EventSource>, SourceError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(SourceError::Unavailable {
                reason: "injected".into(),
            });
        }
        self.journal.push(format!("source created {}", key));
        let source = Arc::new(MockSource {
            key: key.clone(),
            namespace: namespace.map(str::to_string),
            options: options.clone(),
            sink: Mutex::new(None),
            closes: AtomicU32::new(0),
            fail_close: AtomicBool::new(false),
            refuse_bridges: AtomicBool::new(false),
            bridges: AtomicU32::new(0),
            on_close: Mutex::new(None),
            journal: self.journal.clone(),
        });
        self.sources.lock().push(source.clone());
        Ok(source)
    }
}

/// What the delete hook observed about the connection
#[derive(Debug, Clone)]
pub struct DeletedSnapshot {
    pub state: ConnectionState,
    pub had_primary_bond: bool,
    pub bridges: usize,
}

type DeletedHook = Arc<dyn Fn(&Connection) + Send + Sync>;

pub struct RecordingHandler {
    calls: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,
    snapshots: Mutex<Vec<DeletedSnapshot>>,
    streams_seen: Mutex<Vec<bool>>,
    accept_data_channels: AtomicBool,
    on_deleted: Mutex<Option<DeletedHook>>,
    journal: Journal,
}

impl RecordingHandler {
    fn new(journal: Journal) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            snapshots: Mutex::new(Vec::new()),
            streams_seen: Mutex::new(Vec::new()),
            accept_data_channels: AtomicBool::new(true),
            on_deleted: Mutex::new(None),
            journal,
        }
    }

    /// Event hooks invoked so far, as "<event kind> <key>"
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Keys of deleted connections, in deletion order
    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().clone()
    }

    pub fn deleted_snapshots(&self) -> Vec<DeletedSnapshot> {
        self.snapshots.lock().clone()
    }

    /// For each added stream, whether default handling had already recorded it
    pub fn streams_seen_before_default(&self) -> Vec<bool> {
        self.streams_seen.lock().clone()
    }

    pub fn allow_data_channels(&self, accept: bool) {
        self.accept_data_channels.store(accept, Ordering::SeqCst);
    }

    pub fn on_deleted(&self, hook: impl Fn(&Connection) + Send + Sync + 'static) {
        *self.on_deleted.lock() = Some(Arc::new(hook));
    }

    pub fn clear_on_deleted(&self) {
        self.on_deleted.lock().take();
    }

    fn record(&self, kind: &str, connection: &Connection) {
        self.calls.lock().push(format!("{} {}", kind, connection.key()));
    }
}

impl RegistryHandler for RecordingHandler {
    fn on_connection_deleted(&self, connection: &Connection) {
        let key = connection.key().to_string();
        self.journal.push(format!("deleted {}", key));
        self.deleted.lock().push(key);
        self.snapshots.lock().push(DeletedSnapshot {
            state: connection.state(),
            had_primary_bond: connection.has_primary_bond(),
            bridges: connection.secondary_bond_count(),
        });
        let hook = self.on_deleted.lock().clone();
        if let Some(hook) = hook {
            hook(connection);
        }
    }

    fn on_data_channel(&self, connection: &Connection, _channel: &DataChannel) -> bool {
        self.record("data-channel", connection);
        self.accept_data_channels.load(Ordering::SeqCst)
    }

    fn on_negotiation_needed(&self, connection: &Connection) {
        self.record("negotiation-needed", connection);
    }

    fn on_ice_candidate(&self, connection: &Connection, _candidate: &IceCandidate) {
        self.record("ice-candidate", connection);
    }

    fn on_ice_candidate_state_change(&self, connection: &Connection, _state: IceConnectionState) {
        self.record("ice-candidate-state", connection);
    }

    fn on_signaling_state_change(&self, connection: &Connection, _state: SignalingState) {
        self.record("signaling-state", connection);
    }

    fn on_add_stream(&self, connection: &Connection, stream: &MediaStream) {
        self.record("add-stream", connection);
        let seen = connection.peer_state().streams.contains(&stream.label);
        self.streams_seen.lock().push(seen);
    }

    fn on_remove_stream(&self, connection: &Connection, _stream: &MediaStream) {
        self.record("remove-stream", connection);
    }

    fn on_set_session_description(&self, connection: &Connection, _description: &SessionDescription) {
        self.record("set-session-description", connection);
    }
}

pub struct Fixture {
    pub registry: Registry,
    pub sources: Arc<MockSourceFactory>,
    pub bonds: Arc<MockBondFactory>,
    pub handler: Arc<RecordingHandler>,
    pub journal: Journal,
}

pub fn fixture() -> Fixture {
    fixture_with(RegistryConfig::default())
}

pub fn fixture_with(config: RegistryConfig) -> Fixture {
    let journal = Journal::default();
    let sources = Arc::new(MockSourceFactory {
        journal: journal.clone(),
        ..Default::default()
    });
    let bonds = Arc::new(MockBondFactory {
        journal: journal.clone(),
        ..Default::default()
    });
    let handler = Arc::new(RecordingHandler::new(journal.clone()));
    let registry = Registry::new(config, handler.clone(), sources.clone(), bonds.clone());
    Fixture {
        registry,
        sources,
        bonds,
        handler,
        journal,
    }
}

pub struct NoopFixture {
    pub registry: Registry,
    pub sources: Arc<MockSourceFactory>,
}

/// Registry whose handler keeps every default hook
pub fn noop_registry() -> NoopFixture {
    let sources = Arc::new(MockSourceFactory::default());
    let registry = Registry::new(
        RegistryConfig::default(),
        Arc::new(NoopHandler),
        sources.clone(),
        Arc::new(MockBondFactory::default()),
    );
    NoopFixture { registry, sources }
}
