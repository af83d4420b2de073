//! Relay between an event source, the registry hooks and the connection

use crate::connection::Connection;
use crate::registry::{RegistryHandler, RegistryShared};
use crate::source::{EventSink, EventSource};
use rtcbond_shared::PeerEvent;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;

/// Routes one connection's events. Holds no strong reference to the
/// registry, the connection or the source.
pub struct CallbackRelay {
    registry: Weak<RegistryShared>,
    connection: Weak<Connection>,
    source: Weak<dyn EventSource>,
    attached: AtomicBool,
}

impl CallbackRelay {
    pub(crate) fn new(
        registry: Weak<RegistryShared>,
        connection: Weak<Connection>,
        source: &Arc<dyn EventSource>,
    ) -> Self {
        Self {
            registry,
            connection,
            source: Arc::downgrade(source),
            attached: AtomicBool::new(false),
        }
    }

    /// Register with the event source
    pub(crate) fn attach(self: &Arc<Self>) {
        if let Some(source) = self.source.upgrade() {
            self.attached.store(true, Ordering::SeqCst);
            source.attach(self.clone());
        }
    }

    /// Detach from the event source. Registry state is left alone.
    pub fn shutdown(&self) {
        if !self.attached.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(source) = self.source.upgrade() {
            source.detach();
        }
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }

    /// Deliver to the application hook. Returns false if default handling
    /// must be skipped.
    fn notify(handler: &dyn RegistryHandler, connection: &Connection, event: &PeerEvent) -> bool {
        match event {
            PeerEvent::DataChannelOpened(channel) => {
                return handler.on_data_channel(connection, channel);
            }
            PeerEvent::IceCandidate(candidate) => handler.on_ice_candidate(connection, candidate),
            PeerEvent::IceCandidateStateChanged(state) => {
                handler.on_ice_candidate_state_change(connection, *state)
            }
            PeerEvent::SignalingStateChanged(state) => {
                handler.on_signaling_state_change(connection, *state)
            }
            PeerEvent::NegotiationNeeded => handler.on_negotiation_needed(connection),
            PeerEvent::StreamAdded(stream) => handler.on_add_stream(connection, stream),
            PeerEvent::StreamRemoved(stream) => handler.on_remove_stream(connection, stream),
            PeerEvent::SessionDescriptionSet(description) => {
                handler.on_set_session_description(connection, description)
            }
        }
        true
    }
}

impl EventSink for CallbackRelay {
    fn deliver(&self, event: PeerEvent) {
        if !self.is_attached() {
            debug!("[RELAY] dropped {} event after shutdown", event.kind());
            return;
        }

        let connection = match self.connection.upgrade() {
            Some(connection) => connection,
            None => return,
        };

        if let Some(registry) = self.registry.upgrade() {
            if !Self::notify(registry.handler.as_ref(), &connection, &event) {
                debug!("[RELAY] {} {} vetoed by application", connection, event.kind());
                return;
            }
        }

        connection.handle_event(&event);
    }
}
