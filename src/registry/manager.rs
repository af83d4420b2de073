//! Registry of live connections keyed by (session, peer)

use super::handler::RegistryHandler;
use super::server::ServerHandle;
use crate::bond::BondFactory;
use crate::connection::{Connection, ConnectionOptions};
use crate::error::RegistryError;
use crate::source::SourceFactory;
use parking_lot::Mutex;
use rtcbond_shared::{ConnectionKey, PeerId, SessionId, TeardownTrigger};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Registry-wide defaults
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Name used in logs
    pub id: String,
    /// Routing prefix for connections created without one
    pub namespace: Option<String>,
    /// Primary bond timeout for connections created without one.
    /// Zero disables bonding, `None` keeps the bond factory default.
    pub default_bond_timeout: Option<Duration>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            id: "rtcbond".into(),
            namespace: None,
            default_bond_timeout: None,
        }
    }
}

/// State shared between the registry handle and the connections it owns
pub(crate) struct RegistryShared {
    id: String,
    namespace: Option<String>,
    default_bond_timeout: Option<Duration>,
    pub(crate) handler: Arc<dyn RegistryHandler>,
    sources: Arc<dyn SourceFactory>,
    bonds: Arc<dyn BondFactory>,
    connections: Mutex<HashMap<ConnectionKey, Arc<Connection>>>,
    servers: Mutex<Vec<Box<dyn ServerHandle>>>,
}

impl RegistryShared {
    /// Drop `connection` from the table. An entry that has since been
    /// replaced by another connection at the same key is left alone.
    pub(crate) fn release(&self, connection: &Connection) -> bool {
        let mut connections = self.connections.lock();
        let registered = connections
            .get(connection.key())
            .is_some_and(|entry| std::ptr::eq(Arc::as_ptr(entry), connection));
        if registered {
            connections.remove(connection.key());
        }
        registered
    }
}

/// Creates, looks up, replaces and destroys connections.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone)]
pub struct Registry {
    shared: Arc<RegistryShared>,
}

impl Registry {
    pub fn new(
        config: RegistryConfig,
        handler: Arc<dyn RegistryHandler>,
        sources: Arc<dyn SourceFactory>,
        bonds: Arc<dyn BondFactory>,
    ) -> Self {
        Self {
            shared: Arc::new(RegistryShared {
                id: config.id,
                namespace: config.namespace,
                default_bond_timeout: config.default_bond_timeout,
                handler,
                sources,
                bonds,
                connections: Mutex::new(HashMap::new()),
                servers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Create a connection for (session, peer), deleting any connection
    /// already registered under that key first.
    pub fn create(
        &self,
        session_id: impl Into<SessionId>,
        peer_id: impl Into<PeerId>,
        options: ConnectionOptions,
    ) -> Result<Arc<Connection>, RegistryError> {
        let key = ConnectionKey::new(session_id, peer_id);

        let existing = self.shared.connections.lock().remove(&key);
        if let Some(existing) = existing {
            info!("[REGISTRY] pc {} already exists, deleting ...", key);
            existing.teardown(TeardownTrigger::Replaced);
        }

        let options = options.inherit(
            self.shared.namespace.as_deref(),
            self.shared.default_bond_timeout,
        );
        let source = self
            .shared
            .sources
            .create(&key, options.namespace.as_deref(), &options.source)?;
        let connection = Connection::new(
            key.clone(),
            &options,
            source,
            self.shared.bonds.clone(),
            &self.shared,
        );

        // A hook may have created another connection at this key meanwhile
        let displaced = self
            .shared
            .connections
            .lock()
            .insert(key.clone(), connection.clone());
        if let Some(displaced) = displaced {
            info!("[REGISTRY] pc {} created concurrently, deleting it ...", key);
            displaced.teardown(TeardownTrigger::Replaced);
        }

        if let Err(err) = connection.activate() {
            warn!("[REGISTRY] pc {} bond failed to start: {}", key, err);
            connection.teardown(TeardownTrigger::BondStartFailed);
            return Err(err.into());
        }

        info!("[REGISTRY] {} created pc {}", self.shared.id, connection);
        Ok(connection)
    }

    /// Delete the connection at (session, peer). No-op if there is none.
    pub fn delete(&self, session_id: impl Into<SessionId>, peer_id: impl Into<PeerId>) {
        let key = ConnectionKey::new(session_id, peer_id);
        let connection = self.shared.connections.lock().get(&key).cloned();
        if let Some(connection) = connection {
            connection.delete();
        }
    }

    /// Delete every connection, then shut down every owned server
    pub fn shutdown(&self) {
        let connections: Vec<_> = self.shared.connections.lock().values().cloned().collect();
        info!(
            "[REGISTRY] {} shutting down {} connection(s)",
            self.shared.id,
            connections.len()
        );
        for connection in connections {
            connection.teardown(TeardownTrigger::RegistryShutdown);
        }

        let servers = std::mem::take(&mut *self.shared.servers.lock());
        for server in servers {
            match server.shutdown() {
                Ok(()) => info!("[REGISTRY] server {} shut down", server.name()),
                Err(e) => warn!("[REGISTRY] server {} shutdown failed: {}", server.name(), e),
            }
        }
    }

    /// Hand a server to the registry; it is shut down by `shutdown`
    pub fn add_server(&self, server: Box<dyn ServerHandle>) {
        self.shared.servers.lock().push(server);
    }

    pub fn get(
        &self,
        session_id: impl Into<SessionId>,
        peer_id: impl Into<PeerId>,
    ) -> Option<Arc<Connection>> {
        let key = ConnectionKey::new(session_id, peer_id);
        self.shared.connections.lock().get(&key).cloned()
    }

    pub fn contains(&self, session_id: impl Into<SessionId>, peer_id: impl Into<PeerId>) -> bool {
        let key = ConnectionKey::new(session_id, peer_id);
        self.shared.connections.lock().contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.shared.connections.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.connections.lock().is_empty()
    }

    /// Keys of all registered connections, sorted
    pub fn keys(&self) -> Vec<ConnectionKey> {
        let mut keys: Vec<_> = self.shared.connections.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn id(&self) -> &str {
        &self.shared.id
    }

    pub fn namespace(&self) -> Option<&str> {
        self.shared.namespace.as_deref()
    }

    pub fn default_bond_timeout(&self) -> Option<Duration> {
        self.shared.default_bond_timeout
    }
}
