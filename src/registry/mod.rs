//! Connection registry
//!
//! This module handles:
//! - The keyed table of live connections
//! - Replacing a connection when its key is reused
//! - Registry-wide shutdown of connections and owned servers
//! - The application hooks the callback relay forwards events to

mod handler;
mod manager;
mod server;

pub use handler::{NoopHandler, RegistryHandler};
pub use manager::{Registry, RegistryConfig};
pub(crate) use manager::RegistryShared;
pub use server::ServerHandle;
