//! Per-connection configuration

use crate::source::SourceOptions;
use std::time::Duration;

/// Options for `Registry::create`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Primary bond heartbeat timeout.
    /// `None` inherits the registry default, zero disables bonding.
    pub bond_timeout: Option<Duration>,
    /// Routing prefix; `None` inherits the registry namespace
    pub namespace: Option<String>,
    /// Passed through to the event source factory
    pub source: SourceOptions,
}

impl ConnectionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bond_timeout(mut self, timeout: Duration) -> Self {
        self.bond_timeout = Some(timeout);
        self
    }

    /// No heartbeat supervision for this connection
    pub fn without_bonding(self) -> Self {
        self.with_bond_timeout(Duration::ZERO)
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_source_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.source.insert(key.into(), value.into());
        self
    }

    pub fn bonding_enabled(&self) -> bool {
        !matches!(self.bond_timeout, Some(timeout) if timeout.is_zero())
    }

    /// Fill unset fields from registry-wide defaults
    pub(crate) fn inherit(mut self, namespace: Option<&str>, bond_timeout: Option<Duration>) -> Self {
        if self.namespace.is_none() {
            self.namespace = namespace.map(str::to_string);
        }
        if self.bond_timeout.is_none() {
            self.bond_timeout = bond_timeout;
        }
        self
    }
}
