//! Services owned by a registry

/// A service the registry shuts down after all of its connections
pub trait ServerHandle: Send + Sync {
    /// Human-readable name for logs
    fn name(&self) -> &str;

    fn shutdown(&self) -> anyhow::Result<()>;
}
