//! In-memory event source for local development and demos

use super::traits::{
    BridgeHandle, BridgeOptions, EventSink, EventSource, LaunchSpec, SourceFactory, SourceOptions,
};
use parking_lot::Mutex;
use rtcbond_shared::{ConnectionKey, PeerEvent, SourceError, TransportError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;

/// Event source with no transport: events are injected with `emit`
pub struct LoopbackSource {
    key: ConnectionKey,
    namespace: Option<String>,
    options: SourceOptions,
    sink: Mutex<Option<Arc<dyn EventSink>>>,
    bridges: Mutex<Vec<BridgeHandle>>,
    closed: AtomicBool,
}

impl LoopbackSource {
    pub fn new(key: ConnectionKey, namespace: Option<String>, options: SourceOptions) -> Self {
        Self {
            key,
            namespace,
            options,
            sink: Mutex::new(None),
            bridges: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn key(&self) -> &ConnectionKey {
        &self.key
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn options(&self) -> &SourceOptions {
        &self.options
    }

    /// Deliver `event` to the attached sink. Returns false if nothing is attached.
    pub fn emit(&self, event: PeerEvent) -> bool {
        // Clone out of the lock: the sink may re-enter this source
        let sink = self.sink.lock().clone();
        match sink {
            Some(sink) => {
                sink.deliver(event);
                true
            }
            None => {
                debug!("[LOOPBACK] {} dropped {} event: no sink", self.key, event.kind());
                false
            }
        }
    }

    pub fn is_attached(&self) -> bool {
        self.sink.lock().is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Bridges opened so far
    pub fn bridges(&self) -> Vec<BridgeHandle> {
        self.bridges.lock().clone()
    }
}

impl EventSource for LoopbackSource {
    fn attach(&self, sink: Arc<dyn EventSink>) {
        *self.sink.lock() = Some(sink);
    }

    fn detach(&self) {
        self.sink.lock().take();
    }

    fn open_bridge(
        &self,
        label: &str,
        launch: &LaunchSpec,
        _options: &BridgeOptions,
    ) -> Result<Option<BridgeHandle>, SourceError> {
        if self.is_closed() {
            return Ok(None);
        }

        debug!("[LOOPBACK] {} bridging \"{}\" to {}", self.key, label, launch.program);
        let handle = BridgeHandle {
            label: label.to_string(),
            bond_id: format!("{}/{}", self.key.bond_id(self.namespace()), label),
        };
        self.bridges.lock().push(handle.clone());
        Ok(Some(handle))
    }

    fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        Ok(())
    }
}

/// Creates loopback sources and keeps them reachable by key while
/// their connection holds them
#[derive(Default)]
pub struct LoopbackSourceFactory {
    sources: Mutex<HashMap<ConnectionKey, Weak<LoopbackSource>>>,
}

impl LoopbackSourceFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent source created for `key`, if it is still alive
    pub fn source(&self, key: &ConnectionKey) -> Option<Arc<LoopbackSource>> {
        let mut sources = self.sources.lock();
        let source = sources.get(key).and_then(Weak::upgrade);
        if source.is_none() {
            sources.remove(key);
        }
        source
    }

    /// Number of sources still alive
    pub fn live_sources(&self) -> usize {
        self.sources
            .lock()
            .values()
            .filter(|source| source.strong_count() > 0)
            .count()
    }
}

impl SourceFactory for LoopbackSourceFactory {
    fn create(
        &self,
        key: &ConnectionKey,
        namespace: Option<&str>,
        options: &SourceOptions,
    ) -> Result<Arc<dyn EventSource>, SourceError> {
        let source = Arc::new(LoopbackSource::new(
            key.clone(),
            namespace.map(str::to_string),
            options.clone(),
        ));
        let mut sources = self.sources.lock();
        sources.retain(|_, source| source.strong_count() > 0);
        sources.insert(key.clone(), Arc::downgrade(&source));
        Ok(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtcbond_shared::DataChannel;

    #[derive(Default)]
    struct Collect(Mutex<Vec<PeerEvent>>);

    impl EventSink for Collect {
        fn deliver(&self, event: PeerEvent) {
            self.0.lock().push(event);
        }
    }

    fn source() -> LoopbackSource {
        LoopbackSource::new(ConnectionKey::new("s1", "p1"), None, SourceOptions::new())
    }

    #[test]
    fn test_emit_requires_sink() {
        let source = source();
        assert!(!source.emit(PeerEvent::NegotiationNeeded));

        let sink = Arc::new(Collect::default());
        source.attach(sink.clone());
        assert!(source.emit(PeerEvent::NegotiationNeeded));
        assert!(source.emit(PeerEvent::DataChannelOpened(DataChannel::new("chat"))));
        assert_eq!(sink.0.lock().len(), 2);

        source.detach();
        assert!(!source.is_attached());
        assert!(!source.emit(PeerEvent::NegotiationNeeded));
        assert_eq!(sink.0.lock().len(), 2);
    }

    #[test]
    fn test_close_twice_reports_closed() {
        let source = source();
        assert_eq!(source.close(), Ok(()));
        assert_eq!(source.close(), Err(TransportError::Closed));
    }

    #[test]
    fn test_bridges_declined_after_close() {
        let source = LoopbackSource::new(
            ConnectionKey::new("s1", "p1"),
            Some("/robot".into()),
            SourceOptions::new(),
        );
        let launch = LaunchSpec::new("rosbridge");

        let handle = source
            .open_bridge("rosbridge", &launch, &BridgeOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(handle.bond_id, "/robot/s1/p1/rosbridge");

        source.close().unwrap();
        let declined = source
            .open_bridge("other", &launch, &BridgeOptions::default())
            .unwrap();
        assert!(declined.is_none());
        assert_eq!(source.bridges().len(), 1);
    }

    #[test]
    fn test_factory_tracks_latest_source() {
        let factory = LoopbackSourceFactory::new();
        let key = ConnectionKey::new("s1", "p1");
        let mut options = SourceOptions::new();
        options.insert("ice_servers".into(), "stun:stun.example.org".into());

        let _held = factory.create(&key, Some("/robot"), &options).unwrap();
        let source = factory.source(&key).unwrap();
        assert_eq!(source.namespace(), Some("/robot"));
        assert_eq!(source.options().get("ice_servers").map(String::as_str), Some("stun:stun.example.org"));
        assert!(factory.source(&ConnectionKey::new("s1", "p2")).is_none());
    }

    #[test]
    fn test_factory_forgets_dropped_sources() {
        let factory = LoopbackSourceFactory::new();
        let first = factory
            .create(&ConnectionKey::new("s1", "p1"), None, &SourceOptions::new())
            .unwrap();
        let _second = factory
            .create(&ConnectionKey::new("s1", "p2"), None, &SourceOptions::new())
            .unwrap();
        assert_eq!(factory.live_sources(), 2);

        drop(first);
        assert_eq!(factory.live_sources(), 1);
        assert!(factory.source(&ConnectionKey::new("s1", "p1")).is_none());
        assert_eq!(factory.sources.lock().len(), 1);
    }
}
